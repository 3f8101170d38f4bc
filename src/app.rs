use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::cli::args::{CliArgs, Command, ConfigCommand, EditableTable, PageArgs};
use crate::cli::validation::{self, parse_table_target};
use crate::config::{self, ConfigFile};
use crate::kpi::KpiReading;
use crate::logging;
use crate::models::{ProductInput, UserInput};
use crate::output::terminal::paint;
use crate::output::{JsonSink, OutputFormat, RenderSink, TerminalSink};
use crate::session::{self, Session};
use crate::table::{LoadOutcome, TableError, TableHandle, TableKind};
use crate::utils;

const DEFAULT_REFRESH_SECONDS: u64 = 300;

#[derive(Debug)]
pub struct RunConfig {
    pub options: session::Options,
    pub output_format: OutputFormat,
    pub no_color: bool,
    pub refresh_interval: Duration,
    pub command: Command,
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<18}: {}", label, value);
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| session::DEFAULT_BASE_URL.to_string());
    let timeout_seconds = args.timeout.or(cfg.timeout).filter(|t| *t > 0);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let header = args.header.or(cfg.header).filter(|h| !h.trim().is_empty());

    let output_format_raw = args
        .output_format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw).ok_or_else(|| {
        format!("invalid output format '{output_format_raw}', expected text or json")
    })?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let refresh_seconds = match &args.command {
        Command::Watch { interval, .. } => *interval,
        _ => None,
    }
    .or(cfg.refresh_interval)
    .filter(|s| *s > 0)
    .unwrap_or(DEFAULT_REFRESH_SECONDS);

    let search_debounce = Duration::from_millis(
        cfg.search_debounce_ms
            .unwrap_or(session::DEFAULT_SEARCH_DEBOUNCE_MS),
    );

    let page_sizes_file = args
        .page_sizes_file
        .or(cfg.page_sizes_file)
        .map(|p| config::expand_tilde(&p))
        .or_else(config::default_page_sizes_path);

    Ok(RunConfig {
        options: session::Options {
            base_url,
            timeout_seconds,
            proxy,
            header,
            search_debounce,
            page_sizes_file,
        },
        output_format,
        no_color,
        refresh_interval: Duration::from_secs(refresh_seconds),
        command: args.command,
    })
}

fn make_sink(format: OutputFormat, kind: &TableKind) -> Box<dyn RenderSink> {
    match format {
        OutputFormat::Text if std::io::stderr().is_terminal() => {
            Box::new(TerminalSink::new(kind.title()))
        }
        OutputFormat::Text => Box::new(TerminalSink::new(kind.title()).without_spinner()),
        OutputFormat::Json => Box::new(JsonSink::stdout()),
    }
}

fn prompt_confirm(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn outcome_to_result(outcome: LoadOutcome) -> Result<(), String> {
    match outcome {
        LoadOutcome::Failed(e) => Err(e.to_string()),
        _ => Ok(()),
    }
}

async fn show_table(
    session: &Session,
    kind: TableKind,
    page: PageArgs,
    format: OutputFormat,
) -> Result<(), String> {
    let sink = make_sink(format, &kind);
    let mut table = session.table(kind, sink).map_err(|e| e.to_string())?;
    if let Some(size) = page.per_page {
        table.apply_page_size(size);
    }
    let outcome = table
        .load(page.page.unwrap_or(1), page.search.as_deref().unwrap_or_default())
        .await;
    outcome_to_result(outcome)
}

async fn delete_record(
    session: &Session,
    table: EditableTable,
    id: &str,
    yes: bool,
    page: PageArgs,
    format: OutputFormat,
) -> Result<(), String> {
    let kind = match table {
        EditableTable::Products => TableKind::Products,
        EditableTable::Users => TableKind::Users,
    };
    let sink = make_sink(format, &kind);
    let title = kind.title();
    let mut controller = session.table(kind, sink).map_err(|e| e.to_string())?;
    if let Some(size) = page.per_page {
        controller.apply_page_size(size);
    }
    // The current page must be known to decide where to land after the delete.
    outcome_to_result(
        controller
            .load(page.page.unwrap_or(1), page.search.as_deref().unwrap_or_default())
            .await,
    )?;

    let outcome = controller
        .delete_with_confirmation(id, |id| {
            yes || tokio::task::block_in_place(|| {
                prompt_confirm(&format!("Delete {id} from {title}?"))
            })
        })
        .await
        .map_err(|e| e.to_string())?;
    match outcome {
        Some(outcome) => outcome_to_result(outcome),
        None => Ok(()),
    }
}

async fn save_record(
    session: &Session,
    kind: TableKind,
    id: Option<String>,
    body: serde_json::Value,
    format: OutputFormat,
) -> Result<(), String> {
    let sink = make_sink(format, &kind);
    let mut controller = session.table(kind, sink).map_err(|e| e.to_string())?;
    let outcome = controller
        .save_record(id.as_deref(), body)
        .await
        .map_err(|e| e.to_string())?;
    outcome_to_result(outcome)
}

fn print_kpis(readings: &[KpiReading], format: OutputFormat) -> Result<(), String> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::to_string(readings)
                .map_err(|e| format!("failed to encode KPIs: {e}"))?;
            println!("{out}");
        }
        OutputFormat::Text => {
            for r in readings {
                let value = match r.error.as_deref() {
                    Some(err) => format!("{} ({})", r.display_value.red(), err.dimmed()),
                    None => r.display_value.bold().to_string(),
                };
                format_kv_line(
                    r.label,
                    &format!("{value}  {}", paint(&r.display_trend, r.trend_tone)),
                );
            }
        }
    }
    Ok(())
}

async fn list_tables(session: &Session, format: OutputFormat) -> Result<(), String> {
    let tables = session.tables().await.map_err(|e| e.to_string())?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&tables).map_err(|e| format!("failed to encode tables: {e}"))?
        ),
        OutputFormat::Text => {
            for t in tables.iter() {
                format_kv_line(&t.name, t.label());
            }
        }
    }
    Ok(())
}

async fn list_database_tables(session: &Session, format: OutputFormat) -> Result<(), String> {
    let tables = session.database_tables().await.map_err(|e| e.to_string())?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&tables).map_err(|e| format!("failed to encode tables: {e}"))?
        ),
        OutputFormat::Text => {
            for name in tables.iter() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

async fn set_source(
    session: &Session,
    table: &str,
    yes: bool,
    format: OutputFormat,
) -> Result<(), String> {
    let question = format!("Make '{table}' the source of every dashboard view?");
    if !yes && !tokio::task::block_in_place(|| prompt_confirm(&question)) {
        return Ok(());
    }
    let message = session
        .set_dashboard_source(table)
        .await
        .map_err(|e| e.to_string())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "message": message })),
        OutputFormat::Text => println!("{} {}", "::".bold().green(), message),
    }
    // Every figure depends on the source table.
    print_kpis(&session.kpis().await, format)
}

async fn watch(
    session: &Session,
    kind: TableKind,
    page: PageArgs,
    format: OutputFormat,
    every: Duration,
) -> Result<(), String> {
    let sink = make_sink(format, &kind);
    let (handle, task) = session.spawn_table(kind, sink).map_err(|e| e.to_string())?;
    if let Some(size) = page.per_page {
        handle.set_page_size(size).await.map_err(|e| e.to_string())?;
    }
    handle
        .load(page.page.unwrap_or(1), page.search.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.to_string())?;

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    info!(seconds = every.as_secs(), "watching");
    print_kpis(&session.kpis().await, format)?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("refresh tick");
                print_kpis(&session.kpis().await, format)?;
                handle.refresh().await.map_err(|e| e.to_string())?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await.map_err(|e| e.to_string())?;
    task.await
        .map_err(|e| format!("table task failed: {e}"))?;
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseCommand {
    Next,
    Previous,
    Page(u32),
    Search(String),
    PageSize(u32),
    Delete(String),
    Refresh,
    Help,
    Quit,
}

pub fn parse_browse_command(line: &str) -> Result<Option<BrowseCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(term) = line.strip_prefix('/') {
        return Ok(Some(BrowseCommand::Search(term.trim().to_string())));
    }
    if let Ok(page) = line.parse::<u32>() {
        if page == 0 {
            return Err("pages start at 1".to_string());
        }
        return Ok(Some(BrowseCommand::Page(page)));
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match (word.to_lowercase().as_str(), rest) {
        ("n" | "next", "") => BrowseCommand::Next,
        ("p" | "prev" | "previous", "") => BrowseCommand::Previous,
        ("r" | "refresh", "") => BrowseCommand::Refresh,
        ("q" | "quit" | "exit", "") => BrowseCommand::Quit,
        ("h" | "help" | "?", "") => BrowseCommand::Help,
        ("size", raw) => BrowseCommand::PageSize(utils::parse_page_size(raw)?),
        ("del" | "delete", id) if !id.is_empty() => BrowseCommand::Delete(id.to_string()),
        _ => return Err(format!("unknown command '{line}', type 'h' for help")),
    };
    Ok(Some(command))
}

const BROWSE_HELP: &str = "n/p next/previous page, N go to page N, /term search, size N rows per page, del ID delete, r refresh, q quit";

async fn dispatch_browse(handle: &TableHandle, command: BrowseCommand) -> Result<(), TableError> {
    match command {
        BrowseCommand::Next => handle.next_page().await,
        BrowseCommand::Previous => handle.previous_page().await,
        BrowseCommand::Page(page) => handle.select_page(page).await,
        BrowseCommand::Search(term) => handle.search(&term).await,
        BrowseCommand::PageSize(size) => handle.set_page_size(size).await,
        BrowseCommand::Refresh => handle.refresh().await,
        BrowseCommand::Delete(id) => handle.delete(&id).await.map(|_| ()),
        BrowseCommand::Help | BrowseCommand::Quit => Ok(()),
    }
}

async fn browse(
    session: &Session,
    kind: TableKind,
    page: PageArgs,
    format: OutputFormat,
) -> Result<(), String> {
    let title = kind.title();
    let sink = make_sink(format, &kind);
    let (handle, task) = session.spawn_table(kind, sink).map_err(|e| e.to_string())?;
    if let Some(size) = page.per_page {
        handle.set_page_size(size).await.map_err(|e| e.to_string())?;
    }
    handle
        .load(page.page.unwrap_or(1), page.search.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.to_string())?;
    eprintln!("{}", BROWSE_HELP.dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match parse_browse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{} {}", "::".bold().red(), e);
                continue;
            }
        };
        match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                eprintln!("{BROWSE_HELP}");
                continue;
            }
            BrowseCommand::Delete(ref id) => {
                eprint!("Delete {id} from {title}? [y/N] ");
                let _ = std::io::stderr().flush();
                let answer = lines.next_line().await.ok().flatten().unwrap_or_default();
                if !is_yes(&answer) {
                    continue;
                }
            }
            _ => {}
        }
        match dispatch_browse(&handle, command).await {
            Ok(()) => {}
            Err(TableError::Closed) => break,
            // Api failures were already shown by the sink.
            Err(TableError::Api(_)) => {}
            Err(e) => eprintln!("{} {}", "::".bold().red(), e),
        }
    }

    handle.shutdown().await.map_err(|e| e.to_string())?;
    task.await
        .map_err(|e| format!("table task failed: {e}"))?;
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    let format = run.output_format;
    let session = Session::new(run.options).map_err(|e| e.to_string())?;
    debug!(base_url = %session.client().base_url(), "running command");

    match run.command {
        Command::Products(page) => show_table(&session, TableKind::Products, page, format).await,
        Command::StockHistory(page) => {
            show_table(&session, TableKind::StockHistory, page, format).await
        }
        Command::Users(page) => show_table(&session, TableKind::Users, page, format).await,
        Command::Table { name, page } => {
            show_table(&session, TableKind::Generic(name), page, format).await
        }
        Command::DbTable { name, page } => {
            show_table(&session, TableKind::Database(name), page, format).await
        }
        Command::Tables => list_tables(&session, format).await,
        Command::DbTables => list_database_tables(&session, format).await,
        Command::Delete {
            table,
            id,
            yes,
            page,
        } => delete_record(&session, table, &id, yes, page, format).await,
        Command::SaveProduct(product) => {
            let input = ProductInput {
                item_code: match product.id {
                    Some(_) => None,
                    None => product.item_code,
                },
                product_name: product.name,
                category: product.category,
                price: product.price,
                stock: product.stock,
                status: product.status,
                description: product.description,
            };
            let body = serde_json::to_value(&input)
                .map_err(|e| format!("failed to encode product: {e}"))?;
            save_record(&session, TableKind::Products, product.id, body, format).await
        }
        Command::SaveUser(user) => {
            let input = UserInput {
                user_id: None,
                username: user.username,
                full_name: user.full_name,
                email: user.email,
                role: user.role,
                status: user.status,
            };
            let body = serde_json::to_value(&input)
                .map_err(|e| format!("failed to encode user: {e}"))?;
            save_record(&session, TableKind::Users, user.id, body, format).await
        }
        Command::Kpi => print_kpis(&session.kpis().await, format),
        Command::SetSource { table, yes } => set_source(&session, &table, yes, format).await,
        Command::Watch { target, page, .. } => {
            let kind = parse_table_target(&target)?;
            watch(&session, kind, page, format, run.refresh_interval).await
        }
        Command::Browse { target, page } => {
            let kind = parse_table_target(&target)?;
            browse(&session, kind, page, format).await
        }
        Command::Config { .. } => Ok(()),
    }
}

fn config_path(args: &CliArgs) -> Result<PathBuf, String> {
    match args.config.as_deref() {
        Some(path) => Ok(config::expand_tilde(path)),
        None => config::default_config_path()
            .ok_or_else(|| "could not determine home directory".to_string()),
    }
}

fn run_config_command(action: &ConfigCommand, path: &Path) -> Result<(), String> {
    match action {
        ConfigCommand::Init => {
            if config::ensure_default_config_file(path)? {
                println!("{} wrote {}", "::".bold().green(), path.display());
            } else {
                println!("{} {} already exists", "::".bold().blue(), path.display());
            }
        }
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let path = config_path(&args)?;
    if let Command::Config { action } = &args.command {
        return run_config_command(action, &path);
    }

    let cfg = config::load_config(&path, args.config.is_none())?;
    validation::validate(&args)?;
    let verbose = args.verbose;
    let force_color = args.color;
    let run = build_run_config(args, cfg)?;

    if force_color {
        colored::control::set_override(true);
    } else if run.no_color {
        colored::control::set_override(false);
    }
    logging::init_logging(verbose, !run.no_color)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
