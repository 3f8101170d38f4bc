pub mod json;
pub mod terminal;

use serde::Serialize;

use crate::pagination::PaginationWindow;
use crate::table::{Cell, Column};

pub use json::{JsonSink, SinkEvent};
pub use terminal::TerminalSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Page selection flows back through [`crate::table::TableHandle`]; the
/// controls passed here only describe what can be selected.
pub trait RenderSink: Send {
    fn render_rows(&mut self, columns: &[Column], rows: &[Vec<Cell>]);

    fn render_placeholder(&mut self, message: &str);

    fn render_error(&mut self, message: &str);

    fn render_pagination_summary(&mut self, start_item: u64, end_item: u64, total: u64);

    fn render_pagination_controls(&mut self, window: &PaginationWindow);

    fn render_loading(&mut self, message: &str) {
        self.render_placeholder(message);
    }

    fn render_notice(&mut self, _notice: &Notice) {}
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn render_rows(&mut self, columns: &[Column], rows: &[Vec<Cell>]) {
        (**self).render_rows(columns, rows)
    }

    fn render_placeholder(&mut self, message: &str) {
        (**self).render_placeholder(message)
    }

    fn render_error(&mut self, message: &str) {
        (**self).render_error(message)
    }

    fn render_pagination_summary(&mut self, start_item: u64, end_item: u64, total: u64) {
        (**self).render_pagination_summary(start_item, end_item, total)
    }

    fn render_pagination_controls(&mut self, window: &PaginationWindow) {
        (**self).render_pagination_controls(window)
    }

    fn render_loading(&mut self, message: &str) {
        (**self).render_loading(message)
    }

    fn render_notice(&mut self, notice: &Notice) {
        (**self).render_notice(notice)
    }
}

pub fn summary_text(start_item: u64, end_item: u64, total: u64) -> String {
    format!("Showing {start_item}-{end_item} of {total}")
}
