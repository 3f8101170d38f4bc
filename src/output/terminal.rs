use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pagination::{PageControl, PaginationWindow};
use crate::table::{Align, Cell, Column, Tone};

use super::{summary_text, Notice, NoticeLevel, RenderSink};

pub struct TerminalSink {
    title: String,
    spinner: Option<ProgressBar>,
    show_spinner: bool,
}

impl TerminalSink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            spinner: None,
            show_spinner: true,
        }
    }

    pub fn without_spinner(mut self) -> Self {
        self.show_spinner = false;
        self
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

pub fn paint(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Plain => text.normal(),
        Tone::Positive => text.green(),
        Tone::Warning => text.yellow(),
        Tone::Negative => text.red(),
        Tone::Info => text.blue(),
    }
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let len = text.chars().count();
    let fill = " ".repeat(width.saturating_sub(len));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}

fn column_widths(columns: &[Column], rows: &[Vec<Cell>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.text.chars().count())
                .chain(std::iter::once(col.title.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn join_cells<F>(columns: &[Column], widths: &[usize], mut cell: F) -> String
where
    F: FnMut(usize, &Column, usize) -> String,
{
    columns
        .iter()
        .zip(widths.iter())
        .enumerate()
        .map(|(idx, (col, w))| cell(idx, col, *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

pub fn render_grid(columns: &[Column], rows: &[Vec<Cell>]) -> Vec<String> {
    let widths = column_widths(columns, rows);
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(join_cells(columns, &widths, |_, col, w| {
        pad(&col.title, w, col.align)
    }));
    lines.push(join_cells(columns, &widths, |_, _, w| "-".repeat(w)));
    for row in rows {
        lines.push(join_cells(columns, &widths, |idx, col, w| {
            let text = row.get(idx).map(|c| c.text.as_str()).unwrap_or_default();
            pad(text, w, col.align)
        }));
    }
    lines
}

pub fn render_controls(window: &PaginationWindow) -> String {
    window
        .controls()
        .into_iter()
        .map(|control| match control {
            PageControl::Previous { enabled } => {
                if enabled {
                    "« prev".to_string()
                } else {
                    "« prev".dimmed().to_string()
                }
            }
            PageControl::Next { enabled } => {
                if enabled {
                    "next »".to_string()
                } else {
                    "next »".dimmed().to_string()
                }
            }
            PageControl::Page {
                number,
                current: true,
            } => format!("[{number}]").bold().to_string(),
            PageControl::Page { number, .. } => number.to_string(),
            PageControl::Ellipsis => "…".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl RenderSink for TerminalSink {
    fn render_rows(&mut self, columns: &[Column], rows: &[Vec<Cell>]) {
        self.clear_spinner();
        let widths = column_widths(columns, rows);
        println!("{}", self.title.bold().white());
        let header = join_cells(columns, &widths, |_, col, w| pad(&col.title, w, col.align));
        println!("{}", header.bold());
        println!(
            "{}",
            join_cells(columns, &widths, |_, _, w| "-".repeat(w)).dimmed()
        );
        for row in rows {
            let line = join_cells(columns, &widths, |idx, col, w| {
                let cell = row.get(idx);
                let text = cell.map(|c| c.text.as_str()).unwrap_or_default();
                let tone = cell.map(|c| c.tone).unwrap_or_default();
                paint(&pad(text, w, col.align), tone).to_string()
            });
            println!("{line}");
        }
    }

    fn render_placeholder(&mut self, message: &str) {
        self.clear_spinner();
        println!("{}", self.title.bold().white());
        println!("{}", message.dimmed());
    }

    fn render_error(&mut self, message: &str) {
        self.clear_spinner();
        println!("{}", self.title.bold().white());
        println!("{} {}", "error ::".bold().red(), message.red());
    }

    fn render_pagination_summary(&mut self, start_item: u64, end_item: u64, total: u64) {
        println!("{}", summary_text(start_item, end_item, total).cyan());
    }

    fn render_pagination_controls(&mut self, window: &PaginationWindow) {
        if !window.is_empty() {
            println!("{}", render_controls(window));
        }
    }

    fn render_loading(&mut self, message: &str) {
        if !self.show_spinner {
            return;
        }
        self.clear_spinner();
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::with_template(":: {spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{} {}", self.title, message));
        pb.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(pb);
    }

    fn render_notice(&mut self, notice: &Notice) {
        let prefix = match notice.level {
            NoticeLevel::Info => "::".bold().blue(),
            NoticeLevel::Success => "::".bold().green(),
            NoticeLevel::Error => "::".bold().red(),
        };
        let line = format!("{prefix} {}", notice.message);
        match self.spinner.as_ref() {
            Some(pb) => pb.println(line),
            None => eprintln!("{line}"),
        }
    }
}
