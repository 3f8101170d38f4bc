use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::catalog;
use crate::client::{ApiClient, ApiError};
use crate::kpi::{self, KpiReading};
use crate::models::TableInfo;
use crate::output::RenderSink;
use crate::table::{
    spawn_table, FilePageSizes, MemoryPageSizes, PageSizeStore, TableController, TableHandle,
    TableKind,
};
use crate::utils;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub search_debounce: Duration,
    pub page_sizes_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: None,
            proxy: None,
            header: None,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            page_sizes_file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("invalid header '{header}': {message}")]
    InvalidHeader { header: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("page size preferences: {message}")]
    PageSizes { message: String },
}

#[derive(Clone, Debug)]
pub struct Session {
    options: Options,
    client: Arc<ApiClient>,
}

impl Session {
    pub fn new(options: Options) -> Result<Self, SessionError> {
        let base_url = parse_base_url(&options.base_url)?;
        let http = build_http_client(
            options.proxy.as_deref(),
            options.timeout_seconds,
            options.header.as_deref(),
        )?;
        debug!(base_url = %base_url, "session ready");
        Ok(Self {
            options,
            client: Arc::new(ApiClient::new(http, base_url)),
        })
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }

    pub fn page_size_store(&self) -> Result<Box<dyn PageSizeStore>, SessionError> {
        match self.options.page_sizes_file.as_ref() {
            Some(path) => {
                let store = FilePageSizes::open(path)
                    .map_err(|message| SessionError::PageSizes { message })?;
                debug!(path = %store.path().display(), "page sizes loaded");
                Ok(Box::new(store))
            }
            None => Ok(Box::new(MemoryPageSizes::new())),
        }
    }

    pub fn table<S: RenderSink>(
        &self,
        kind: TableKind,
        sink: S,
    ) -> Result<TableController<ApiClient, S>, SessionError> {
        Ok(TableController::new(
            kind,
            self.client(),
            sink,
            self.page_size_store()?,
        ))
    }

    pub fn spawn_table<S: RenderSink + 'static>(
        &self,
        kind: TableKind,
        sink: S,
    ) -> Result<(TableHandle, JoinHandle<TableController<ApiClient, S>>), SessionError> {
        let controller = self.table(kind, sink)?;
        Ok(spawn_table(controller, self.options.search_debounce))
    }

    pub async fn kpis(&self) -> Vec<KpiReading> {
        kpi::fetch_all(self.client.as_ref()).await
    }

    pub async fn tables(&self) -> Result<Vec<TableInfo>, ApiError> {
        catalog::list_tables(self.client.as_ref()).await
    }

    pub async fn database_tables(&self) -> Result<Vec<String>, ApiError> {
        catalog::list_database_tables(self.client.as_ref()).await
    }

    pub async fn set_dashboard_source(&self, table_name: &str) -> Result<String, ApiError> {
        catalog::set_dashboard_source(self.client.as_ref(), table_name).await
    }
}

pub fn parse_base_url(raw: &str) -> Result<reqwest::Url, SessionError> {
    let invalid = || SessionError::InvalidBaseUrl {
        url: raw.to_string(),
    };
    let url = reqwest::Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(url)
}

fn build_http_client(
    proxy: Option<&str>,
    timeout_seconds: Option<u64>,
    header: Option<&str>,
) -> Result<reqwest::Client, SessionError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!("dashtable/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    if let Some(raw) = header.filter(|h| !h.trim().is_empty()) {
        let invalid = |message: String| SessionError::InvalidHeader {
            header: raw.to_string(),
            message,
        };
        let (key, value) = utils::parse_header(raw).map_err(invalid)?;
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let value =
            reqwest::header::HeaderValue::from_str(&value).map_err(|e| invalid(e.to_string()))?;
        headers.insert(name, value);
    }

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(secs) = timeout_seconds.filter(|s| *s > 0) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| SessionError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| SessionError::HttpClientBuild { source: e })
}
