//! Route handlers behind the context pipeline.
//!
//! Handlers read the [`RequestContext`] the pipeline bound and talk to the
//! backing services through the client traits held in [`AppState`].
//!
//! [`AppState`]: crate::server::AppState

pub mod data;
pub mod export;
pub mod group;
pub mod jobs;
pub mod organization;

use fhirgate_client::CallContext;

use crate::pipeline::RequestContext;

/// Values forwarded to the backing services for this request.
pub(crate) fn call_context(ctx: &RequestContext) -> CallContext {
    CallContext::new(
        ctx.organization_id().map(str::to_string),
        ctx.request_id().map(str::to_string),
    )
}
