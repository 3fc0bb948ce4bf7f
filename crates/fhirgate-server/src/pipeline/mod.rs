//! Request context pipeline.
//!
//! Each route carries an ordered list of [`Stage`]s. The driver middleware
//! runs them in order against a [`RequestContext`] taken from the request
//! extensions. The first stage that halts produces the response and the
//! handler never runs; otherwise the enriched context is put back for the
//! handler to read.

pub mod context;
pub mod provenance;
pub mod stage;
pub mod stages;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    RequestExt,
    extract::{ConnectInfo, OriginalUri, RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use fhirgate_api::ApiError;
use tracing::{debug, warn};

pub use context::{ContextError, ContextKey, RequestContext};
pub use provenance::ProvenanceHeaderValidator;
pub use stage::{Stage, StageInput, StageOutcome};
pub use stages::{
    AuthCtx, ExportSinceParamCtx, ExportTypesParamCtx, FileNameCtx, GroupCtx, JobCtx, MbiCtx,
    OrganizationCtx, RequestIpCtx, RequestUrlCtx,
};

use crate::middleware::RequestId;

/// Ordered stage list for one route.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first halt.
    pub fn run(&self, input: &StageInput<'_>, mut ctx: RequestContext) -> StageOutcome {
        for stage in &self.stages {
            match stage.process(input, ctx) {
                StageOutcome::Continue(next) => {
                    debug!(stage = stage.name(), "stage passed");
                    ctx = next;
                }
                StageOutcome::Halt(err) => {
                    warn!(
                        stage = stage.name(),
                        status = err.status_code().as_u16(),
                        error = %err,
                        "stage halted request"
                    );
                    return StageOutcome::Halt(err);
                }
            }
        }
        StageOutcome::Continue(ctx)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

/// Driver middleware; attach with `from_fn_with_state` on a method router so
/// path parameters are already matched.
pub async fn run_pipeline(
    State(pipeline): State<Pipeline>,
    mut req: Request,
    next: Next,
) -> Response {
    let path_params: Vec<(String, String)> = match req.extract_parts::<RawPathParams>().await {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    };
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let request_id = req.extensions().get::<RequestId>().cloned();
    // nested routers strip their prefix from the request uri
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or_else(|| req.uri().clone());

    let mut ctx = req
        .extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_default();
    let unbound_id = ctx.request_id().is_none();
    if let Some(id) = request_id.as_ref().filter(|_| unbound_id) {
        ctx = match ctx.bind(ContextKey::RequestId, id.as_str()) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!(error = %e, "failed to seed request context");
                return ApiError::generic_server_issue()
                    .into_response_with_diagnostics(Some(id.as_str()));
            }
        };
    }

    let input = StageInput {
        method: req.method(),
        uri: &uri,
        headers: req.headers(),
        path_params: &path_params,
        peer,
        now: fhirgate_core::now_utc(),
    };

    match pipeline.run(&input, ctx) {
        StageOutcome::Continue(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        StageOutcome::Halt(err) => {
            err.into_response_with_diagnostics(request_id.as_ref().map(RequestId::as_str))
        }
    }
}
