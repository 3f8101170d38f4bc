use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ApiError, ApiRequest, Backend};
use crate::output::{Notice, RenderSink};
use crate::pagination::{
    compute_window, item_range, total_pages, PaginationWindow, DEFAULT_MAX_VISIBLE,
};

use super::prefs::PageSizeStore;
use super::{PageRequest, PageResult, TableError, TableKind, TableViewState, ViewPhase};

const LOADING_MESSAGE: &str = "Loading...";

#[derive(Clone, Debug)]
pub struct LoadTicket {
    pub seq: u64,
    pub request: PageRequest,
    pub api_request: ApiRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Rendered { rows: usize },
    Empty,
    Failed(ApiError),
    Stale,
}

pub struct TableController<B, S> {
    kind: TableKind,
    backend: Arc<B>,
    sink: S,
    prefs: Box<dyn PageSizeStore>,
    state: TableViewState,
    phase: ViewPhase,
    issued: u64,
    rows_on_page: usize,
    last_page: Option<PageResult>,
    max_visible: u32,
}

impl<B: Backend, S: RenderSink> TableController<B, S> {
    pub fn new(kind: TableKind, backend: Arc<B>, sink: S, prefs: Box<dyn PageSizeStore>) -> Self {
        let page_size = prefs
            .load(kind.key())
            .unwrap_or_else(|| kind.default_page_size());
        let state = TableViewState {
            current_page: 1,
            search_term: String::new(),
            page_size,
            table_identifier: kind.table_identifier().map(str::to_string),
        };
        Self {
            kind,
            backend,
            sink,
            prefs,
            state,
            phase: ViewPhase::Idle,
            issued: 0,
            rows_on_page: 0,
            last_page: None,
            max_visible: DEFAULT_MAX_VISIBLE,
        }
    }

    pub fn with_max_visible(mut self, max_visible: u32) -> Self {
        self.max_visible = max_visible.max(1);
        self
    }

    pub fn kind(&self) -> &TableKind {
        &self.kind
    }

    pub fn state(&self) -> &TableViewState {
        &self.state
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn latest_seq(&self) -> u64 {
        self.issued
    }

    pub fn rows_on_page(&self) -> usize {
        self.rows_on_page
    }

    pub fn last_page(&self) -> Option<&PageResult> {
        self.last_page.as_ref()
    }

    /// State changes here, before any response exists.
    pub fn begin_load(&mut self, page: u32, search_term: &str) -> LoadTicket {
        self.state.current_page = page.max(1);
        if self.kind.supports_search() {
            self.state.search_term = search_term.to_string();
        }
        self.issued += 1;
        self.phase = ViewPhase::Loading;

        let request = PageRequest::new(
            self.state.current_page,
            self.state.page_size,
            &self.state.search_term,
        );
        let api_request = self.kind.list_request(&request);
        debug!(
            table = self.kind.key(),
            seq = self.issued,
            page = request.page,
            per_page = request.page_size,
            search = %request.search_term,
            "issuing load"
        );
        self.sink.render_loading(LOADING_MESSAGE);
        LoadTicket {
            seq: self.issued,
            request,
            api_request,
        }
    }

    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Option<Value>, ApiError>,
    ) -> LoadOutcome {
        if ticket.seq != self.issued {
            debug!(
                table = self.kind.key(),
                seq = ticket.seq,
                latest = self.issued,
                "discarding stale response"
            );
            return LoadOutcome::Stale;
        }

        match result.and_then(|payload| PageResult::from_envelope(payload, &ticket.request)) {
            Ok(page) => self.render_page(page, &ticket.request),
            Err(e) => {
                warn!(
                    table = self.kind.key(),
                    kind = e.kind().label(),
                    status = ?e.status_code(),
                    "load failed: {}",
                    e.message()
                );
                self.sink.render_error(&format!(
                    "Could not load {}: {}",
                    self.kind.title(),
                    e.message()
                ));
                self.sink.render_pagination_summary(0, 0, 0);
                self.sink
                    .render_pagination_controls(&PaginationWindow::empty());
                self.rows_on_page = 0;
                self.last_page = None;
                self.phase = ViewPhase::Errored;
                LoadOutcome::Failed(e)
            }
        }
    }

    fn render_page(&mut self, page: PageResult, request: &PageRequest) -> LoadOutcome {
        let columns = self.kind.columns(&page);
        let outcome = if page.items.is_empty() {
            let search_active = !request.search_term.trim().is_empty();
            self.sink
                .render_placeholder(&self.kind.empty_message(search_active));
            LoadOutcome::Empty
        } else {
            let rows = page
                .items
                .iter()
                .map(|item| self.kind.row(item, &columns))
                .collect::<Vec<_>>();
            self.sink.render_rows(&columns, &rows);
            LoadOutcome::Rendered { rows: rows.len() }
        };

        let (start, end) = item_range(page.page, page.page_size, page.total_count);
        self.sink.render_pagination_summary(start, end, page.total_count);
        let pages = total_pages(page.total_count, page.page_size);
        self.sink
            .render_pagination_controls(&compute_window(page.page, pages, self.max_visible));

        info!(
            table = self.kind.key(),
            page = page.page,
            rows = page.items.len(),
            total = page.total_count,
            "rendered page"
        );
        self.rows_on_page = page.items.len();
        self.last_page = Some(page);
        self.phase = ViewPhase::Rendered;
        outcome
    }

    pub async fn load(&mut self, page: u32, search_term: &str) -> LoadOutcome {
        let ticket = self.begin_load(page, search_term);
        let result = self.backend.send(ticket.api_request.clone()).await;
        self.finish_load(&ticket, result)
    }

    pub async fn reload(&mut self) -> LoadOutcome {
        let page = self.current_page();
        let search = self.state.search_term.clone();
        self.load(page, &search).await
    }

    pub async fn on_page_selected(&mut self, page: u32) -> LoadOutcome {
        let search = self.state.search_term.clone();
        self.load(page, &search).await
    }

    pub async fn search(&mut self, term: &str) -> LoadOutcome {
        self.load(1, term).await
    }

    pub fn apply_page_size(&mut self, size: u32) {
        let size = size.max(1);
        self.state.page_size = size;
        if let Err(e) = self.prefs.save(self.kind.key(), size) {
            warn!(table = self.kind.key(), "could not persist page size: {e}");
            self.sink.render_notice(&Notice::info(format!(
                "Showing {size} rows per page, but the setting was not saved."
            )));
        }
    }

    pub async fn on_page_size_changed(&mut self, size: u32) -> LoadOutcome {
        self.apply_page_size(size);
        let search = self.state.search_term.clone();
        self.load(1, &search).await
    }

    /// The page the server last confirmed, or the requested one while no
    /// rendered page is showing. Servers clamp out-of-range requests.
    pub fn current_page(&self) -> u32 {
        match (self.phase, self.last_page.as_ref()) {
            (ViewPhase::Rendered, Some(page)) => page.page,
            _ => self.state.current_page,
        }
    }

    pub fn page_after_delete(&self) -> u32 {
        let current = self.current_page();
        if self.phase == ViewPhase::Rendered && self.rows_on_page == 1 && current > 1 {
            current - 1
        } else {
            current
        }
    }

    async fn send_action(&mut self, request: ApiRequest) -> Result<Option<Value>, TableError> {
        match self.backend.send(request).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                warn!(
                    table = self.kind.key(),
                    kind = e.kind().label(),
                    status = ?e.status_code(),
                    "action failed: {}",
                    e.message()
                );
                self.sink.render_notice(&Notice::error(e.message()));
                Err(TableError::Api(e))
            }
        }
    }

    fn unsupported(&self, action: &'static str) -> TableError {
        TableError::Unsupported {
            action,
            table: self.kind.title(),
        }
    }

    pub async fn on_delete_confirmed(&mut self, id: &str) -> Result<LoadOutcome, TableError> {
        let request = self
            .kind
            .delete_request(id)
            .ok_or_else(|| self.unsupported("delete"))?;
        self.send_action(request).await?;

        info!(table = self.kind.key(), id, "deleted record");
        self.sink
            .render_notice(&Notice::success(format!("Deleted {id}.")));
        let target = self.page_after_delete();
        let search = self.state.search_term.clone();
        Ok(self.load(target, &search).await)
    }

    pub async fn delete_with_confirmation<F>(
        &mut self,
        id: &str,
        confirm: F,
    ) -> Result<Option<LoadOutcome>, TableError>
    where
        F: FnOnce(&str) -> bool,
    {
        if self.kind.delete_request(id).is_none() {
            return Err(self.unsupported("delete"));
        }
        if !confirm(id) {
            debug!(table = self.kind.key(), id, "delete declined");
            return Ok(None);
        }
        self.on_delete_confirmed(id).await.map(Some)
    }

    pub async fn save_record(
        &mut self,
        existing_id: Option<&str>,
        body: Value,
    ) -> Result<LoadOutcome, TableError> {
        let request = self
            .kind
            .save_request(existing_id, body)
            .ok_or_else(|| self.unsupported("save"))?;
        self.send_action(request).await?;

        let (message, target) = match existing_id {
            Some(id) => (format!("Updated {id}."), self.current_page()),
            None => ("Created a new record.".to_string(), 1),
        };
        info!(table = self.kind.key(), id = ?existing_id, "saved record");
        self.sink.render_notice(&Notice::success(message));
        let search = self.state.search_term.clone();
        Ok(self.load(target, &search).await)
    }
}
