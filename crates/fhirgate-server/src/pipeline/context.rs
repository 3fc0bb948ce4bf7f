//! Per-request values bound by pipeline stages.

use std::fmt;

use thiserror::Error;

/// Names of the values a stage may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    ResourceTypes,
    Since,
    OrganizationId,
    GroupId,
    JobId,
    FileName,
    ClientIp,
    Mbi,
    Provenance,
    RequestUrl,
    RequestId,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResourceTypes => "resource_types",
            Self::Since => "since",
            Self::OrganizationId => "organization_id",
            Self::GroupId => "group_id",
            Self::JobId => "job_id",
            Self::FileName => "file_name",
            Self::ClientIp => "client_ip",
            Self::Mbi => "mbi",
            Self::Provenance => "provenance",
            Self::RequestUrl => "request_url",
            Self::RequestId => "request_id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context value {0} is already bound")]
    AlreadyBound(ContextKey),
}

/// Typed, write-once request context.
///
/// Every field starts unbound. A value, once bound, cannot be replaced, so
/// whatever a later stage or handler reads is exactly what the binding stage
/// wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    resource_types: Option<String>,
    since: Option<String>,
    organization_id: Option<String>,
    group_id: Option<String>,
    job_id: Option<String>,
    file_name: Option<String>,
    client_ip: Option<String>,
    mbi: Option<String>,
    provenance: Option<String>,
    request_url: Option<String>,
    request_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, key: ContextKey) -> &mut Option<String> {
        match key {
            ContextKey::ResourceTypes => &mut self.resource_types,
            ContextKey::Since => &mut self.since,
            ContextKey::OrganizationId => &mut self.organization_id,
            ContextKey::GroupId => &mut self.group_id,
            ContextKey::JobId => &mut self.job_id,
            ContextKey::FileName => &mut self.file_name,
            ContextKey::ClientIp => &mut self.client_ip,
            ContextKey::Mbi => &mut self.mbi,
            ContextKey::Provenance => &mut self.provenance,
            ContextKey::RequestUrl => &mut self.request_url,
            ContextKey::RequestId => &mut self.request_id,
        }
    }

    /// Bind `key` to `value`, consuming and returning the context.
    pub fn bind(mut self, key: ContextKey, value: impl Into<String>) -> Result<Self, ContextError> {
        let slot = self.slot(key);
        if slot.is_some() {
            return Err(ContextError::AlreadyBound(key));
        }
        *slot = Some(value.into());
        Ok(self)
    }

    pub fn get(&self, key: ContextKey) -> Option<&str> {
        let value = match key {
            ContextKey::ResourceTypes => &self.resource_types,
            ContextKey::Since => &self.since,
            ContextKey::OrganizationId => &self.organization_id,
            ContextKey::GroupId => &self.group_id,
            ContextKey::JobId => &self.job_id,
            ContextKey::FileName => &self.file_name,
            ContextKey::ClientIp => &self.client_ip,
            ContextKey::Mbi => &self.mbi,
            ContextKey::Provenance => &self.provenance,
            ContextKey::RequestUrl => &self.request_url,
            ContextKey::RequestId => &self.request_id,
        };
        value.as_deref()
    }

    pub fn resource_types(&self) -> Option<&str> {
        self.resource_types.as_deref()
    }
    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }
    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }
    pub fn mbi(&self) -> Option<&str> {
        self.mbi.as_deref()
    }
    pub fn provenance(&self) -> Option<&str> {
        self.provenance.as_deref()
    }
    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
