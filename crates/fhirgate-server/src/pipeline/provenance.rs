use fhirgate_api::ApiError;
use fhirgate_core::{ProvenanceError, validate_provenance};

use super::context::{ContextKey, RequestContext};
use super::stage::{Stage, StageInput, StageOutcome, bind};
use super::stages::PROVENANCE_HEADER;

pub const MISSING_PROVENANCE: &str = "Missing provenance header";

/// Validates the provenance header against the bound organization.
///
/// Must run after the stage that binds the organization id. In lenient mode
/// a request without the header passes through unvalidated; a header that is
/// present is always checked.
#[derive(Debug, Clone, Copy)]
pub struct ProvenanceHeaderValidator {
    strict: bool,
}

impl ProvenanceHeaderValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl Stage for ProvenanceHeaderValidator {
    fn name(&self) -> &'static str {
        "ProvenanceHeaderValidator"
    }

    fn process(&self, input: &StageInput<'_>, ctx: RequestContext) -> StageOutcome {
        let raw = match input.header(PROVENANCE_HEADER).filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw,
            None if self.strict => {
                return StageOutcome::Halt(ApiError::bad_request(MISSING_PROVENANCE));
            }
            None => return StageOutcome::Continue(ctx),
        };

        match validate_provenance(raw, ctx.organization_id(), input.now) {
            Ok(_) => bind(ctx, ContextKey::Provenance, raw),
            Err(e) => StageOutcome::Halt(provenance_error(e)),
        }
    }
}

fn provenance_error(err: ProvenanceError) -> ApiError {
    if err.is_fatal() {
        tracing::error!(error = %err, "provenance header could not be processed");
        ApiError::generic_server_issue()
    } else {
        ApiError::bad_request(err.to_string())
    }
}
