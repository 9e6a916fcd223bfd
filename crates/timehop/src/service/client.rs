use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use url::form_urlencoded;

use super::errors::{Result, ServiceError};
use super::pagination::paginate;
use super::rate_limit::RequestPacer;
use super::types::{ServiceKind, ServiceSettings};
use crate::http::{
    DEFAULT_TIMEOUT, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport,
};
use crate::retry::{RetryConfig, RetryError, with_retry};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Per-request options for [`ServiceClient::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: HttpMethod,
    pub query: Vec<(String, String)>,
    pub headers: HttpHeaders,
    pub body: Option<serde_json::Value>,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::with_method(HttpMethod::Get)
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Post).with_body(body)
    }

    pub fn put(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Put).with_body(body)
    }

    pub fn delete() -> Self {
        Self::with_method(HttpMethod::Delete)
    }

    fn with_method(method: HttpMethod) -> Self {
        Self {
            method,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_query_pairs(mut self, pairs: &[(&str, String)]) -> Self {
        self.query
            .extend(pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Authenticated, paced, retrying HTTP client for one service account.
#[derive(Clone)]
pub struct ServiceClient {
    kind: ServiceKind,
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    reports_url: Option<String>,
    auth: (&'static str, String),
    pacer: RequestPacer,
    retry: RetryConfig,
    page_size: usize,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl ServiceClient {
    /// Client over a real reqwest transport.
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let transport =
            ReqwestTransport::with_timeout(DEFAULT_TIMEOUT).map_err(|e| ServiceError::Transport {
                service: settings.kind,
                message: e.to_string(),
            })?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    pub fn with_transport(settings: &ServiceSettings, transport: Arc<dyn HttpTransport>) -> Self {
        let auth = match settings.kind {
            ServiceKind::Clockify => ("X-Api-Key", settings.token.clone()),
            ServiceKind::Toggl => {
                let credentials = STANDARD.encode(format!("{}:api_token", settings.token));
                ("Authorization", format!("Basic {credentials}"))
            }
        };

        Self {
            kind: settings.kind,
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            reports_url: settings.reports_url.clone(),
            auth,
            pacer: RequestPacer::new(settings.request_delay),
            retry: settings.retry,
            page_size: settings.page_size.max(1),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn reports_url(&self) -> Option<&str> {
        self.reports_url.as_deref()
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Wait out the per-service request spacing.
    pub async fn pace(&self) {
        self.pacer.wait().await;
    }

    pub(crate) fn emit(&self, event: SyncProgress) {
        emit(self.on_progress.as_deref(), event);
    }

    /// Send one logical request, retrying 429 responses with a fixed cooldown.
    ///
    /// `endpoint` is either a path appended to the base URL or an absolute
    /// URL (anything starting with `http`), which is used verbatim.
    pub async fn fetch(&self, endpoint: &str, options: FetchOptions) -> Result<HttpResponse> {
        let request = self.build_request(endpoint, &options)?;
        let client = self;
        let request_ref = &request;

        let outcome = with_retry(
            move || client.send_once(request_ref, endpoint),
            self.retry,
            ServiceError::is_rate_limited,
            |attempt, delay| {
                tracing::warn!(
                    service = %self.kind,
                    method = %options.method,
                    endpoint,
                    attempt,
                    cooldown_secs = delay.as_secs(),
                    "Rate limited, backing off"
                );
                self.emit(SyncProgress::RateLimitBackoff {
                    service: self.kind,
                    endpoint: endpoint.to_string(),
                    retry_after_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                });
            },
        )
        .await;

        match outcome {
            Ok(response) => Ok(response),
            Err(RetryError::Failed(e)) => Err(e),
            Err(RetryError::Exhausted { attempts, .. }) => {
                tracing::error!(service = %self.kind, endpoint, attempts, "Giving up after repeated rate limiting");
                Err(ServiceError::MaxAttemptsReached {
                    service: self.kind,
                    endpoint: endpoint.to_string(),
                    attempts,
                })
            }
        }
    }

    /// GET-style call decoding a JSON array. Blank bodies become an empty list.
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: FetchOptions,
    ) -> Result<Vec<T>> {
        let response = self.fetch(endpoint, options).await?;
        if response.is_blank() {
            return Ok(Vec::new());
        }
        self.decode(endpoint, &response)
    }

    /// Call decoding a JSON object. Blank bodies become `T::default()`.
    pub async fn fetch_object<T: DeserializeOwned + Default>(
        &self,
        endpoint: &str,
        options: FetchOptions,
    ) -> Result<T> {
        let response = self.fetch(endpoint, options).await?;
        if response.is_blank() {
            return Ok(T::default());
        }
        self.decode(endpoint, &response)
    }

    /// Call whose body must decode as `T`; a blank body is an error.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: FetchOptions,
    ) -> Result<T> {
        let response = self.fetch(endpoint, options).await?;
        self.decode(endpoint, &response)
    }

    /// Call whose body is ignored.
    pub async fn fetch_empty(&self, endpoint: &str, options: FetchOptions) -> Result<()> {
        self.fetch(endpoint, options).await.map(|_| ())
    }

    /// Collect a `page`/`page-size` listing until a short page comes back.
    pub async fn collect_paginated<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let client = self;
        let page_size = self.page_size;

        paginate(page_size, move |page| {
            let options = FetchOptions::get()
                .with_query_pairs(query)
                .with_query("page", page)
                .with_query("page-size", page_size);
            async move {
                let items: Vec<T> = client.fetch_list(endpoint, options).await?;
                client.emit(SyncProgress::PageFetched {
                    service: client.kind,
                    endpoint: endpoint.to_string(),
                    page,
                    count: items.len(),
                });
                Ok(items)
            }
        })
        .await
    }

    fn decode<T: DeserializeOwned>(&self, endpoint: &str, response: &HttpResponse) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|source| ServiceError::Json {
            service: self.kind,
            endpoint: endpoint.to_string(),
            source,
        })
    }

    fn build_request(&self, endpoint: &str, options: &FetchOptions) -> Result<HttpRequest> {
        let mut url = if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.base_url, endpoint)
        };

        if !options.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&options.query)
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        let mut headers: HttpHeaders = vec![
            (self.auth.0.to_string(), self.auth.1.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ];

        let body = match options.body {
            Some(ref value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                serde_json::to_vec(value).map_err(|source| ServiceError::Json {
                    service: self.kind,
                    endpoint: endpoint.to_string(),
                    source,
                })?
            }
            None => Vec::new(),
        };

        headers.extend(options.headers.iter().cloned());

        Ok(HttpRequest {
            method: options.method,
            url,
            headers,
            body,
        })
    }

    async fn send_once(&self, request: &HttpRequest, endpoint: &str) -> Result<HttpResponse> {
        self.pacer.wait().await;

        tracing::debug!(service = %self.kind, method = %request.method, url = %request.url, "Sending request");

        let response =
            self.transport
                .send(request.clone())
                .await
                .map_err(|e| ServiceError::Transport {
                    service: self.kind,
                    message: e.to_string(),
                })?;

        if response.status == 429 {
            return Err(ServiceError::RateLimited {
                service: self.kind,
                method: request.method,
                endpoint: endpoint.to_string(),
            });
        }

        if !response.is_success() {
            return Err(ServiceError::Api {
                service: self.kind,
                method: request.method,
                endpoint: endpoint.to_string(),
                status: response.status,
                body: response.body_text(),
            });
        }

        Ok(response)
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("pacer", &self.pacer)
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
