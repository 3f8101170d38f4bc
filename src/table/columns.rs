use serde::Serialize;
use serde_json::Value;

use crate::models::lenient_number;
use crate::utils::{
    format_datetime, format_grouped, format_quantity, humanize_header, looks_like_datetime,
    EMPTY_CELL,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Plain,
    Positive,
    Warning,
    Negative,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: String,
    pub title: String,
    pub align: Align,
}

impl Column {
    fn new(key: &str, title: &str, align: Align) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            align,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    pub tone: Tone,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Plain,
        }
    }

    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

pub fn product_columns() -> Vec<Column> {
    vec![
        Column::new("ItemCode", "Item Code", Align::Left),
        Column::new("ProductName", "Product", Align::Left),
        Column::new("Category", "Category", Align::Left),
        Column::new("Price", "Price", Align::Right),
        Column::new("Stock", "Stock", Align::Right),
        Column::new("Status", "Status", Align::Left),
    ]
}

pub fn stock_history_columns() -> Vec<Column> {
    vec![
        Column::new("Timestamp", "Time", Align::Left),
        Column::new("Product", "Product", Align::Left),
        Column::new("MovementType", "Movement", Align::Left),
        Column::new("QuantityChange", "Quantity", Align::Right),
        Column::new("BalanceAfter", "Balance", Align::Right),
        Column::new("Reference", "Reference", Align::Left),
    ]
}

pub fn user_columns() -> Vec<Column> {
    vec![
        Column::new("UserID", "ID", Align::Left),
        Column::new("Username", "Username", Align::Left),
        Column::new("FullName", "Full Name", Align::Left),
        Column::new("Email", "Email", Align::Left),
        Column::new("Role", "Role", Align::Left),
        Column::new("Status", "Status", Align::Left),
        Column::new("LastLogin", "Last Login", Align::Left),
    ]
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or(item: &Value, key: &str, fallback: &str) -> String {
    text_field(item, key).unwrap_or_else(|| fallback.to_string())
}

fn date_cell(item: &Value, key: &str) -> Cell {
    let text = text_field(item, key)
        .map(|raw| format_datetime(&raw).unwrap_or(raw))
        .unwrap_or_else(|| EMPTY_CELL.to_string());
    Cell::plain(text)
}

fn number_cell(item: &Value, key: &str, render: impl Fn(f64) -> String) -> Cell {
    let text = item
        .get(key)
        .and_then(lenient_number)
        .map(render)
        .unwrap_or_else(|| EMPTY_CELL.to_string());
    Cell::plain(text)
}

pub fn product_status_tone(status: &str) -> Tone {
    match status {
        "Active" | "วางขาย" => Tone::Positive,
        "Out of Stock" | "สินค้าหมด" => Tone::Warning,
        _ => Tone::Plain,
    }
}

pub fn user_status_tone(status: &str) -> Tone {
    match status {
        "Active" => Tone::Positive,
        "Inactive" => Tone::Warning,
        "Suspended" => Tone::Negative,
        _ => Tone::Plain,
    }
}

pub fn movement_tone(movement: &str) -> Tone {
    let lower = movement.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["รับเข้า", "ordered", "คืน", "received", "return"]) {
        Tone::Positive
    } else if has(&["ขายออก", "จ่ายออก", "sold", "issued"]) {
        Tone::Negative
    } else if has(&["ปรับปรุง", "ย้าย", "adjust", "transfer"]) {
        Tone::Info
    } else {
        Tone::Plain
    }
}

pub fn product_row(item: &Value) -> Vec<Cell> {
    let name = text_field(item, "ProductName")
        .or_else(|| text_field(item, "Description"))
        .unwrap_or_else(|| EMPTY_CELL.to_string());
    let status = text_or(item, "Status", "N/A");
    vec![
        Cell::plain(text_or(item, "ItemCode", EMPTY_CELL)),
        Cell::plain(name),
        Cell::plain(text_or(item, "Category", EMPTY_CELL)),
        number_cell(item, "Price", |v| format_grouped(v, 2)),
        number_cell(item, "Stock", |v| format_grouped(v.trunc(), 0)),
        Cell::toned(status.clone(), product_status_tone(&status)),
    ]
}

pub fn stock_movement_row(item: &Value) -> Vec<Cell> {
    let product = [
        text_field(item, "ProductIdentifier"),
        text_field(item, "ProductName"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" - ");
    let movement = text_or(item, "MovementType", "N/A");
    vec![
        date_cell(item, "Timestamp"),
        Cell::plain(if product.is_empty() {
            EMPTY_CELL.to_string()
        } else {
            product
        }),
        Cell::toned(movement.clone(), movement_tone(&movement)),
        number_cell(item, "QuantityChange", format_quantity),
        number_cell(item, "BalanceAfter", format_quantity),
        Cell::plain(text_or(item, "Reference", EMPTY_CELL)),
    ]
}

pub fn user_row(item: &Value) -> Vec<Cell> {
    let status = text_or(item, "Status", "N/A");
    vec![
        Cell::plain(text_or(item, "UserID", EMPTY_CELL)),
        Cell::plain(text_or(item, "Username", EMPTY_CELL)),
        Cell::plain(text_or(item, "FullName", EMPTY_CELL)),
        Cell::plain(text_or(item, "Email", EMPTY_CELL)),
        Cell::plain(text_or(item, "Role", "User")),
        Cell::toned(status.clone(), user_status_tone(&status)),
        date_cell(item, "LastLogin"),
    ]
}

/// A declared column list wins. Otherwise every key seen across the rows is
/// used, in first-seen order, so a sparse first row does not hide columns.
pub fn infer_columns(declared: Option<&[String]>, items: &[Value], humanize: bool) -> Vec<Column> {
    let keys: Vec<String> = match declared {
        Some(declared) if !declared.is_empty() => declared.to_vec(),
        _ => {
            let mut keys: Vec<String> = Vec::new();
            for obj in items.iter().filter_map(Value::as_object) {
                for key in obj.keys() {
                    if !keys.iter().any(|k| k == key) {
                        keys.push(key.clone());
                    }
                }
            }
            keys
        }
    };

    keys.into_iter()
        .map(|key| {
            let align = if items
                .iter()
                .filter_map(|item| item.get(&key))
                .find(|v| !v.is_null())
                .is_some_and(Value::is_number)
            {
                Align::Right
            } else {
                Align::Left
            };
            let title = if humanize {
                humanize_header(&key)
            } else {
                key.clone()
            };
            Column { key, title, align }
        })
        .collect()
}

pub fn format_generic_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(Value::Bool(true)) => "Yes".to_string(),
        Some(Value::Bool(false)) => "No".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if looks_like_datetime(s) => {
            format_datetime(s).unwrap_or_else(|| s.clone())
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn generic_row(item: &Value, columns: &[Column]) -> Vec<Cell> {
    columns
        .iter()
        .map(|col| Cell::plain(format_generic_value(item.get(&col.key))))
        .collect()
}
