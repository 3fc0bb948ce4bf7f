use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use fhirgate_api::{ApiError, FHIR_JSON_CONTENT_TYPE};
use fhirgate_client::ResourceKind;

use super::call_context;
use crate::pipeline::RequestContext;
use crate::server::AppState;

pub async fn read(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(org_id) = ctx.organization_id() else {
        return ApiError::bad_request(
            "Failed to extract organization id from url, please check the url",
        )
        .into_response_with_diagnostics(ctx.request_id());
    };

    match state
        .attribution
        .get(&call_context(&ctx), ResourceKind::Organization, org_id)
        .await
    {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, FHIR_JSON_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(organization_id = org_id, error = %e, "failed to get the organization");
            ApiError::not_found("Failed to find the organization")
                .into_response_with_diagnostics(ctx.request_id())
        }
    }
}
