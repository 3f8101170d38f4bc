pub mod error;

use std::future::Future;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use error::{ApiError, ApiErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: reqwest::Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new<I, S>(method: reqwest::Method, segments: I, body: Option<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(reqwest::Method::GET, segments, None)
    }

    pub fn post<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(reqwest::Method::POST, segments, Some(body))
    }

    pub fn put<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(reqwest::Method::PUT, segments, Some(body))
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(reqwest::Method::DELETE, segments, None)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn endpoint(&self) -> String {
        let mut out = String::new();
        for segment in self.segments.iter() {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        if !self.query.is_empty() {
            let pairs = self
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>();
            out.push('?');
            out.push_str(&pairs.join("&"));
        }
        out
    }
}

/// `Ok(None)` is a successful response without a payload (HTTP 204).
pub trait Backend: Send + Sync + 'static {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<Option<Value>, ApiError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: reqwest::Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    pub fn build_url(&self, segments: &[String]) -> Result<reqwest::Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::network(format!("base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments.iter().map(|s| s.as_str()));
        Ok(url)
    }

    pub async fn request(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let url = self.build_url(&request.segments)?;
        let endpoint = request.endpoint();
        debug!(method = %request.method, %endpoint, "sending request");

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(kind = "network", method = %request.method, %endpoint, "request failed: {e}");
                return Err(ApiError::network(e.to_string()));
            }
        };
        let status = resp.status();
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(kind = "network", method = %request.method, %endpoint, "reading body failed: {e}");
                return Err(ApiError::network(e.to_string()));
            }
        };
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            %endpoint,
            "received response"
        );

        let outcome = interpret_response(status.as_u16(), status.canonical_reason(), &body);
        if let Err(e) = outcome.as_ref() {
            warn!(
                kind = e.kind().label(),
                status = ?e.status_code(),
                %endpoint,
                "request failed: {}",
                e.message()
            );
        }
        outcome
    }
}

impl Backend for ApiClient {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<Option<Value>, ApiError>> + Send {
        self.request(request)
    }
}

pub fn interpret_response(
    status: u16,
    reason: Option<&str>,
    body: &[u8],
) -> Result<Option<Value>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::server(
            status,
            server_error_message(status, reason, body),
        ));
    }
    if status == 204 {
        return Ok(None);
    }
    serde_json::from_slice::<Value>(body)
        .map(Some)
        .map_err(|e| ApiError::malformed(Some(status), format!("invalid JSON body: {e}")))
}

fn server_error_message(status: u16, reason: Option<&str>, body: &[u8]) -> String {
    let fallback = format!("Server error: {} {}", status, reason.unwrap_or_default())
        .trim_end()
        .to_string();
    match serde_json::from_slice::<Value>(body) {
        Ok(parsed) => ["message", "error"]
            .iter()
            .filter_map(|key| parsed.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                fallback
            } else {
                text.to_string()
            }
        }
    }
}
