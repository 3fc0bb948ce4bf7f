//! reqwest implementations of the service clients.
//!
//! One [`ServiceClient`] serves all three traits: the attribution and job
//! endpoints share a base URL. Transport failures and 5xx responses are
//! retried with a fixed backoff; 4xx responses fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fhirgate_core::ExportRequest;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::traits::{AttributionClient, CallContext, DataClient, JobClient, ResourceKind};

/// Header carrying the organization the call is made for.
pub const ORGANIZATION_HEADER: &str = "x-org";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const FHIR_JSON: &str = "application/fhir+json";
const JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    /// Extra attempts after the first.
    pub retries: u32,
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retries: 3,
            timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(200),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base: String,
    retries: u32,
    retry_backoff: Duration,
}

impl ServiceClient {
    pub fn new(config: HttpClientConfig) -> ClientResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("{}: {e}", config.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "unsupported scheme {}",
                base.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
            retries: config.retries,
            retry_backoff: config.retry_backoff,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn export_url(&self, group_id: &str) -> String {
        format!("{}/$export", self.endpoint(&["Group", group_id]))
    }

    fn forwarded_headers(ctx: &CallContext) -> ClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(org) = &ctx.organization_id {
            let value = HeaderValue::from_str(org)
                .map_err(|e| ClientError::Request(format!("organization id: {e}")))?;
            headers.insert(ORGANIZATION_HEADER, value);
        }
        if let Some(request_id) = &ctx.request_id {
            let value = HeaderValue::from_str(request_id)
                .map_err(|e| ClientError::Request(format!("request id: {e}")))?;
            headers.insert(REQUEST_ID_HEADER, value);
        }
        Ok(headers)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<(&'static str, &Bytes)>,
    ) -> ClientResult<Bytes> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(headers.clone());
        if let Some((content_type, body)) = body {
            request = request.header(CONTENT_TYPE, content_type).body(body.clone());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Transport(format!("request timed out: {e}"))
            } else if e.is_connect() {
                ClientError::Transport(format!("failed to connect: {e}"))
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response body: {e}")))
    }

    #[instrument(skip(self, ctx, body), fields(request_id = ctx.request_id.as_deref()))]
    async fn call(
        &self,
        ctx: &CallContext,
        method: Method,
        url: String,
        body: Option<(&'static str, Bytes)>,
    ) -> ClientResult<Bytes> {
        let headers = Self::forwarded_headers(ctx)?;
        let attempts = self.retries + 1;
        let mut attempt = 1;

        loop {
            let body = body.as_ref().map(|(ct, b)| (*ct, b));
            match self.send_once(&method, &url, &headers, body).await {
                Ok(bytes) => {
                    debug!(attempt, len = bytes.len(), "upstream call succeeded");
                    return Ok(bytes);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, error = %err, "upstream call failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "upstream call failed");
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl AttributionClient for ServiceClient {
    async fn get(&self, ctx: &CallContext, kind: ResourceKind, id: &str) -> ClientResult<Bytes> {
        let url = self.endpoint(&[kind.as_str(), id]);
        self.call(ctx, Method::GET, url, None).await
    }

    async fn post(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        body: Bytes,
    ) -> ClientResult<Bytes> {
        let url = self.endpoint(&[kind.as_str()]);
        self.call(ctx, Method::POST, url, Some((FHIR_JSON, body)))
            .await
    }
}

#[async_trait]
impl JobClient for ServiceClient {
    async fn export(&self, ctx: &CallContext, request: &ExportRequest) -> ClientResult<String> {
        let body = serde_json::to_vec(request)
            .map_err(|e| ClientError::Request(format!("export request: {e}")))?;
        let url = self.export_url(&request.group_id);
        let response = self
            .call(ctx, Method::POST, url, Some((JSON, Bytes::from(body))))
            .await?;

        let job_id = String::from_utf8(response.to_vec())
            .map_err(|e| ClientError::InvalidResponse(format!("job id is not UTF-8: {e}")))?;
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(ClientError::InvalidResponse("empty job id".into()));
        }
        Ok(job_id.to_string())
    }

    async fn status(&self, ctx: &CallContext, job_id: &str) -> ClientResult<Bytes> {
        let url = self.endpoint(&["Job", job_id]);
        self.call(ctx, Method::GET, url, None).await
    }
}

#[async_trait]
impl DataClient for ServiceClient {
    async fn get_file(&self, ctx: &CallContext, file_name: &str) -> ClientResult<Bytes> {
        let url = self.endpoint(&["Data", file_name]);
        self.call(ctx, Method::GET, url, None).await
    }
}
