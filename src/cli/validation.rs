use crate::cli::args::{CliArgs, Command, PageArgs};
use crate::output::OutputFormat;
use crate::table::TableKind;

pub fn parse_table_target(raw: &str) -> Result<TableKind, String> {
    let raw = raw.trim();
    let named = |prefix: &str| {
        raw.strip_prefix(prefix)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    };
    match raw.to_lowercase().as_str() {
        "products" => return Ok(TableKind::Products),
        "stock-history" | "stock_history" | "history" => return Ok(TableKind::StockHistory),
        "users" => return Ok(TableKind::Users),
        _ => {}
    }
    if let Some(name) = named("table:") {
        return Ok(TableKind::Generic(name));
    }
    if let Some(name) = named("db:") {
        return Ok(TableKind::Database(name));
    }
    Err(format!(
        "unknown table '{raw}', expected products, stock-history, users, table:NAME or db:NAME"
    ))
}

fn validate_page_args(page: &PageArgs) -> Result<(), String> {
    if page.page == Some(0) {
        return Err("invalid page, expected positive integer".to_string());
    }
    if page.per_page == Some(0) {
        return Err("invalid per-page, expected positive integer".to_string());
    }
    Ok(())
}

fn reject_search(kind: &TableKind, page: &PageArgs) -> Result<(), String> {
    if !kind.supports_search() && page.search.is_some() {
        return Err(format!("{} does not support --search", kind.title()));
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text or json"
            ));
        }
    }
    if let Some(raw) = args.header.as_deref() {
        crate::utils::parse_header(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    if args.timeout == Some(0) {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    match &args.command {
        Command::Products(page) | Command::StockHistory(page) | Command::Users(page) => {
            validate_page_args(page)?
        }
        Command::Table { name, page } => {
            if name.trim().is_empty() {
                return Err("table name is empty".to_string());
            }
            validate_page_args(page)?
        }
        Command::DbTable { name, page } => {
            if name.trim().is_empty() {
                return Err("table name is empty".to_string());
            }
            validate_page_args(page)?;
            reject_search(&TableKind::Database(name.clone()), page)?
        }
        Command::Delete { id, page, .. } => {
            if id.trim().is_empty() {
                return Err("id is empty".to_string());
            }
            validate_page_args(page)?
        }
        Command::SaveProduct(product) => {
            if product.name.trim().is_empty() {
                return Err("product name is empty".to_string());
            }
            if !product.price.is_finite() || product.price < 0.0 {
                return Err("invalid price, expected a non-negative number".to_string());
            }
        }
        Command::SaveUser(user) => {
            if user.username.trim().is_empty() {
                return Err("username is empty".to_string());
            }
        }
        Command::SetSource { table, .. } => {
            if table.trim().is_empty() {
                return Err("table name is empty".to_string());
            }
        }
        Command::Watch {
            target,
            interval,
            page,
        } => {
            let kind = parse_table_target(target)?;
            if *interval == Some(0) {
                return Err("invalid interval, expected positive integer".to_string());
            }
            validate_page_args(page)?;
            reject_search(&kind, page)?
        }
        Command::Browse { target, page } => {
            let kind = parse_table_target(target)?;
            validate_page_args(page)?;
            reject_search(&kind, page)?
        }
        Command::Tables | Command::DbTables | Command::Kpi | Command::Config { .. } => {}
    }
    Ok(())
}
