use std::net::SocketAddr;

use axum::http::{HeaderMap, Method, Uri};
use fhirgate_api::ApiError;
use fhirgate_core::params::query_param;
use time::OffsetDateTime;

use super::context::{ContextKey, RequestContext};

/// Read-only view of the inbound request handed to every stage.
#[derive(Debug)]
pub struct StageInput<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub path_params: &'a [(String, String)],
    pub peer: Option<SocketAddr>,
    pub now: OffsetDateTime,
}

impl StageInput<'_> {
    /// Header value as a string; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self, name: &str) -> Option<String> {
        query_param(self.uri.query(), name)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Result of running one stage.
#[derive(Debug)]
pub enum StageOutcome {
    Continue(RequestContext),
    Halt(ApiError),
}

impl StageOutcome {
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt(_))
    }
}

/// One request decorator: derive a value and bind it, or halt.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome;
}

/// Bind a value, treating a double bind as a server fault.
pub(crate) fn bind(ctx: RequestContext, key: ContextKey, value: impl Into<String>) -> StageOutcome {
    match ctx.bind(key, value) {
        Ok(ctx) => StageOutcome::Continue(ctx),
        Err(e) => {
            tracing::error!(error = %e, "pipeline misconfigured");
            StageOutcome::Halt(ApiError::generic_server_issue())
        }
    }
}
