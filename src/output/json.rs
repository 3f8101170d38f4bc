use std::io::Write;

use serde::Serialize;

use crate::pagination::{PageControl, PaginationWindow};
use crate::table::{Cell, Column};

use super::{Notice, RenderSink};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    Loading {
        message: String,
    },
    Rows {
        columns: Vec<Column>,
        rows: Vec<Vec<Cell>>,
    },
    Placeholder {
        message: String,
    },
    Error {
        message: String,
    },
    Summary {
        start_item: u64,
        end_item: u64,
        total: u64,
    },
    Controls {
        window: PaginationWindow,
        controls: Vec<PageControl>,
    },
    Notice {
        notice: Notice,
    },
}

#[derive(Debug, Default)]
pub struct JsonSink {
    events: Vec<SinkEvent>,
    echo: bool,
}

impl JsonSink {
    pub fn recording() -> Self {
        Self::default()
    }

    pub fn stdout() -> Self {
        Self {
            events: Vec::new(),
            echo: true,
        }
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.events)
    }

    fn push(&mut self, event: SinkEvent) {
        if self.echo {
            if let Ok(line) = serde_json::to_string(&event) {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{line}");
            }
        }
        self.events.push(event);
    }
}

impl RenderSink for JsonSink {
    fn render_rows(&mut self, columns: &[Column], rows: &[Vec<Cell>]) {
        self.push(SinkEvent::Rows {
            columns: columns.to_vec(),
            rows: rows.to_vec(),
        });
    }

    fn render_placeholder(&mut self, message: &str) {
        self.push(SinkEvent::Placeholder {
            message: message.to_string(),
        });
    }

    fn render_error(&mut self, message: &str) {
        self.push(SinkEvent::Error {
            message: message.to_string(),
        });
    }

    fn render_pagination_summary(&mut self, start_item: u64, end_item: u64, total: u64) {
        self.push(SinkEvent::Summary {
            start_item,
            end_item,
            total,
        });
    }

    fn render_pagination_controls(&mut self, window: &PaginationWindow) {
        self.push(SinkEvent::Controls {
            window: window.clone(),
            controls: window.controls(),
        });
    }

    fn render_loading(&mut self, message: &str) {
        self.push(SinkEvent::Loading {
            message: message.to_string(),
        });
    }

    fn render_notice(&mut self, notice: &Notice) {
        self.push(SinkEvent::Notice {
            notice: notice.clone(),
        });
    }
}
