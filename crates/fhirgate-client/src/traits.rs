use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use fhirgate_core::ExportRequest;

use crate::error::ClientResult;

/// Resource collections exposed by the attribution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Group,
    Organization,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Organization => "Organization",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request values forwarded on every upstream call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub organization_id: Option<String>,
    pub request_id: Option<String>,
}

impl CallContext {
    pub fn new(organization_id: Option<String>, request_id: Option<String>) -> Self {
        Self {
            organization_id,
            request_id,
        }
    }
}

#[async_trait]
pub trait AttributionClient: Send + Sync {
    async fn get(&self, ctx: &CallContext, kind: ResourceKind, id: &str) -> ClientResult<Bytes>;

    async fn post(&self, ctx: &CallContext, kind: ResourceKind, body: Bytes)
    -> ClientResult<Bytes>;
}

#[async_trait]
pub trait JobClient: Send + Sync {
    /// Submit an export job and return its identifier.
    async fn export(&self, ctx: &CallContext, request: &ExportRequest) -> ClientResult<String>;

    /// Raw job status document.
    async fn status(&self, ctx: &CallContext, job_id: &str) -> ClientResult<Bytes>;
}

#[async_trait]
pub trait DataClient: Send + Sync {
    /// Contents of one export output file.
    async fn get_file(&self, ctx: &CallContext, file_name: &str) -> ClientResult<Bytes>;
}
