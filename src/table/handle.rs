use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::client::{ApiError, Backend};
use crate::output::RenderSink;
use crate::pagination::total_pages;

use super::controller::{LoadOutcome, LoadTicket, TableController};
use super::debounce::Debouncer;
use super::{TableError, TableViewState};

type Reply = oneshot::Sender<Result<LoadOutcome, TableError>>;
type Landed = (LoadTicket, Result<Option<Value>, ApiError>);
type InFlight = FuturesUnordered<BoxFuture<'static, Landed>>;

#[derive(Debug)]
pub enum TableCommand {
    Load { page: u32, search: String },
    SelectPage(u32),
    NextPage,
    PreviousPage,
    Search(String),
    PageSize(u32),
    Delete { id: String, reply: Reply },
    Save {
        id: Option<String>,
        body: Value,
        reply: Reply,
    },
    Refresh,
    Snapshot(oneshot::Sender<TableViewState>),
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct TableHandle {
    tx: mpsc::Sender<TableCommand>,
}

impl TableHandle {
    async fn send(&self, command: TableCommand) -> Result<(), TableError> {
        self.tx.send(command).await.map_err(|_| TableError::Closed)
    }

    pub async fn load(&self, page: u32, search: &str) -> Result<(), TableError> {
        self.send(TableCommand::Load {
            page,
            search: search.to_string(),
        })
        .await
    }

    pub async fn select_page(&self, page: u32) -> Result<(), TableError> {
        self.send(TableCommand::SelectPage(page)).await
    }

    pub async fn next_page(&self) -> Result<(), TableError> {
        self.send(TableCommand::NextPage).await
    }

    pub async fn previous_page(&self) -> Result<(), TableError> {
        self.send(TableCommand::PreviousPage).await
    }

    pub async fn search(&self, term: &str) -> Result<(), TableError> {
        self.send(TableCommand::Search(term.to_string())).await
    }

    pub async fn set_page_size(&self, size: u32) -> Result<(), TableError> {
        self.send(TableCommand::PageSize(size)).await
    }

    pub async fn refresh(&self) -> Result<(), TableError> {
        self.send(TableCommand::Refresh).await
    }

    pub async fn delete(&self, id: &str) -> Result<LoadOutcome, TableError> {
        let (reply, rx) = oneshot::channel();
        self.send(TableCommand::Delete {
            id: id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| TableError::Closed)?
    }

    pub async fn save(&self, id: Option<&str>, body: Value) -> Result<LoadOutcome, TableError> {
        let (reply, rx) = oneshot::channel();
        self.send(TableCommand::Save {
            id: id.map(str::to_string),
            body,
            reply,
        })
        .await?;
        rx.await.map_err(|_| TableError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<TableViewState, TableError> {
        let (reply, rx) = oneshot::channel();
        self.send(TableCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| TableError::Closed)
    }

    pub async fn shutdown(&self) -> Result<(), TableError> {
        self.send(TableCommand::Shutdown).await
    }
}

/// Moves `controller` onto its own task. The join handle yields it back
/// after shutdown.
pub fn spawn_table<B, S>(
    controller: TableController<B, S>,
    search_debounce: Duration,
) -> (TableHandle, JoinHandle<TableController<B, S>>)
where
    B: Backend,
    S: RenderSink + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(run_table(controller, rx, Debouncer::new(search_debounce)));
    (TableHandle { tx }, task)
}

fn start_load<B, S>(
    controller: &mut TableController<B, S>,
    in_flight: &mut InFlight,
    page: u32,
    search: &str,
) where
    B: Backend,
    S: RenderSink,
{
    let ticket = controller.begin_load(page, search);
    let backend = controller.backend();
    in_flight.push(
        async move {
            let result = backend.send(ticket.api_request.clone()).await;
            (ticket, result)
        }
        .boxed(),
    );
}

async fn run_table<B, S>(
    mut controller: TableController<B, S>,
    mut rx: mpsc::Receiver<TableCommand>,
    mut debounce: Debouncer<String>,
) -> TableController<B, S>
where
    B: Backend,
    S: RenderSink,
{
    let mut in_flight: InFlight = FuturesUnordered::new();

    loop {
        let deadline = debounce.deadline();
        tokio::select! {
            command = rx.recv() => match command {
                None | Some(TableCommand::Shutdown) => break,
                Some(command) => {
                    handle_command(&mut controller, command, &mut debounce, &mut in_flight).await
                }
            },
            Some((ticket, result)) = in_flight.next(), if !in_flight.is_empty() => {
                controller.finish_load(&ticket, result);
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(term) = debounce.take_due(Instant::now()) {
                    start_load(&mut controller, &mut in_flight, 1, &term);
                }
            }
        }
    }

    if let Some(term) = debounce.cancel() {
        debug!(%term, "dropping pending search on shutdown");
    }
    while let Some((ticket, result)) = in_flight.next().await {
        controller.finish_load(&ticket, result);
    }
    controller
}

async fn handle_command<B, S>(
    controller: &mut TableController<B, S>,
    command: TableCommand,
    debounce: &mut Debouncer<String>,
    in_flight: &mut InFlight,
) where
    B: Backend,
    S: RenderSink,
{
    let current = controller.current_page();
    let search = controller.state().search_term.clone();
    match command {
        TableCommand::Load { page, search } => {
            debounce.cancel();
            start_load(controller, in_flight, page, &search);
        }
        TableCommand::SelectPage(page) => start_load(controller, in_flight, page, &search),
        TableCommand::NextPage => {
            let last = controller
                .last_page()
                .map(|p| total_pages(p.total_count, p.page_size))
                .unwrap_or(0);
            if current < last {
                start_load(controller, in_flight, current + 1, &search);
            }
        }
        TableCommand::PreviousPage => {
            if current > 1 {
                start_load(controller, in_flight, current - 1, &search);
            }
        }
        TableCommand::Search(term) => debounce.push(term, Instant::now()),
        TableCommand::PageSize(size) => {
            controller.apply_page_size(size);
            start_load(controller, in_flight, 1, &search);
        }
        TableCommand::Refresh => start_load(controller, in_flight, current, &search),
        TableCommand::Delete { id, reply } => {
            let _ = reply.send(controller.on_delete_confirmed(&id).await);
        }
        TableCommand::Save { id, body, reply } => {
            let _ = reply.send(controller.save_record(id.as_deref(), body).await);
        }
        TableCommand::Snapshot(reply) => {
            let _ = reply.send(controller.state().clone());
        }
        TableCommand::Shutdown => {}
    }
}
