pub mod columns;
pub mod controller;
pub mod debounce;
pub mod handle;
pub mod prefs;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::client::{ApiError, ApiRequest};
use crate::models::lenient_number;

pub use columns::{Align, Cell, Column, Tone};
pub use controller::{LoadOutcome, LoadTicket, TableController};
pub use debounce::Debouncer;
pub use handle::{spawn_table, TableCommand, TableHandle};
pub use prefs::{FilePageSizes, MemoryPageSizes, PageSizeStore};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{action} is not available for {table}")]
    Unsupported { action: &'static str, table: String },

    #[error("table view task has stopped")]
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "kebab-case")]
pub enum TableKind {
    Products,
    StockHistory,
    Users,
    Generic(String),
    Database(String),
}

impl TableKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::StockHistory => "stock-history",
            Self::Users => "users",
            Self::Generic(_) => "generic",
            Self::Database(_) => "database",
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Products => "products".to_string(),
            Self::StockHistory => "stock history".to_string(),
            Self::Users => "users".to_string(),
            Self::Generic(name) => format!("table '{name}'"),
            Self::Database(name) => format!("database table '{name}'"),
        }
    }

    pub fn default_page_size(&self) -> u32 {
        match self {
            Self::Products => 25,
            Self::StockHistory => 15,
            Self::Users => 10,
            Self::Generic(_) => 10,
            Self::Database(_) => 20,
        }
    }

    pub fn table_identifier(&self) -> Option<&str> {
        match self {
            Self::Generic(name) | Self::Database(name) => Some(name),
            _ => None,
        }
    }

    pub fn supports_search(&self) -> bool {
        !matches!(self, Self::Database(_))
    }

    fn record_collection(&self) -> Option<&'static str> {
        match self {
            Self::Products => Some("products"),
            Self::Users => Some("users"),
            _ => None,
        }
    }

    pub fn list_request(&self, request: &PageRequest) -> ApiRequest {
        let base = match self {
            Self::Products => ApiRequest::get(["products"]),
            Self::StockHistory => ApiRequest::get(["stock-history"]),
            Self::Users => ApiRequest::get(["users"]),
            Self::Generic(name) => ApiRequest::get(["tables", name.as_str(), "data"]),
            Self::Database(name) => ApiRequest::get(["database", "table", name.as_str()]),
        };
        let base = base
            .with_query("page", request.page)
            .with_query("per_page", request.page_size);
        if self.supports_search() {
            base.with_query("search", &request.search_term)
        } else {
            base
        }
    }

    pub fn delete_request(&self, id: &str) -> Option<ApiRequest> {
        self.record_collection()
            .map(|collection| ApiRequest::delete([collection, id]))
    }

    pub fn save_request(&self, existing_id: Option<&str>, body: Value) -> Option<ApiRequest> {
        let collection = self.record_collection()?;
        Some(match existing_id {
            Some(id) => ApiRequest::put([collection, id], body),
            None => ApiRequest::post([collection], body),
        })
    }

    pub fn empty_message(&self, search_active: bool) -> String {
        if search_active {
            format!("No {} match the current search.", self.title())
        } else {
            format!("No {} found.", self.title())
        }
    }

    pub fn columns(&self, page: &PageResult) -> Vec<Column> {
        match self {
            Self::Products => columns::product_columns(),
            Self::StockHistory => columns::stock_history_columns(),
            Self::Users => columns::user_columns(),
            Self::Generic(_) => columns::infer_columns(page.columns.as_deref(), &page.items, true),
            Self::Database(_) => {
                columns::infer_columns(page.columns.as_deref(), &page.items, false)
            }
        }
    }

    pub fn row(&self, item: &Value, columns: &[Column]) -> Vec<Cell> {
        match self {
            Self::Products => columns::product_row(item),
            Self::StockHistory => columns::stock_movement_row(item),
            Self::Users => columns::user_row(item),
            Self::Generic(_) | Self::Database(_) => columns::generic_row(item, columns),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub search_term: String,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, search_term: &str) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            search_term: search_term.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageResult {
    pub items: Vec<Value>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub columns: Option<Vec<String>>,
    pub table_name: Option<String>,
}

impl PageResult {
    /// A payload without a `data` array is a hard failure; the other fields
    /// fall back to the request's values.
    pub fn from_envelope(payload: Option<Value>, request: &PageRequest) -> Result<Self, ApiError> {
        let payload =
            payload.ok_or_else(|| ApiError::malformed(None, "response had no body"))?;
        let mut items = match payload.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(ApiError::malformed(
                    None,
                    "response is missing the 'data' array",
                ))
            }
        };

        let total_count = payload
            .get("total")
            .and_then(lenient_number)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u64)
            .unwrap_or(items.len() as u64);
        let page = positive_u32(payload.get("page")).unwrap_or(request.page);
        let page_size = positive_u32(payload.get("per_page")).unwrap_or(request.page_size);

        if items.len() > page_size as usize {
            warn!(
                received = items.len(),
                page_size, "server returned more rows than the page size, truncating"
            );
            items.truncate(page_size as usize);
        }

        let columns = payload
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|cols| !cols.is_empty());
        let table_name = payload
            .get("table_name")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            items,
            total_count,
            page,
            page_size,
            columns,
            table_name,
        })
    }
}

fn positive_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(lenient_number)
        .filter(|n| *n >= 1.0)
        .map(|n| n.min(f64::from(u32::MAX)) as u32)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableViewState {
    pub current_page: u32,
    pub search_term: String,
    pub page_size: u32,
    pub table_identifier: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPhase {
    Idle,
    Loading,
    Rendered,
    Errored,
}
