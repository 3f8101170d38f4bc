use serde_json::{json, Value};
use tracing::info;

use crate::client::{ApiError, ApiRequest, Backend};
use crate::models::TableInfo;

pub async fn list_tables<B: Backend>(backend: &B) -> Result<Vec<TableInfo>, ApiError> {
    let payload = backend.send(ApiRequest::get(["tables"])).await?;
    match payload {
        Some(value @ Value::Array(_)) => serde_json::from_value::<Vec<TableInfo>>(value)
            .map_err(|e| ApiError::malformed(None, format!("unexpected table list: {e}"))),
        _ => Err(ApiError::malformed(None, "table list is not an array")),
    }
}

pub async fn list_database_tables<B: Backend>(backend: &B) -> Result<Vec<String>, ApiError> {
    let payload = backend.send(ApiRequest::get(["database", "tables"])).await?;
    match payload {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                Value::Object(obj) => obj
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect()),
        _ => Err(ApiError::malformed(None, "database table list is not an array")),
    }
}

pub async fn set_dashboard_source<B: Backend>(
    backend: &B,
    table_name: &str,
) -> Result<String, ApiError> {
    let name = table_name.trim();
    let payload = backend
        .send(ApiRequest::post(
            ["dashboard", "set-source-table"],
            json!({ "table_name": name }),
        ))
        .await?;
    let message = payload
        .as_ref()
        .and_then(|p| p.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("'{name}' is now the dashboard source."));
    info!(table = name, "dashboard source changed");
    Ok(message)
}
