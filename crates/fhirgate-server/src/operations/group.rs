use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use fhirgate_api::{ApiError, FHIR_JSON_CONTENT_TYPE};
use fhirgate_client::ResourceKind;
use fhirgate_core::validate_group;

use super::call_context;
use crate::pipeline::RequestContext;
use crate::server::AppState;

/// Validate a Group and hand it to the attribution service.
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    if let Err(e) = validate_group(&body, state.group_validator.as_ref()).await {
        tracing::warn!(error = %e, "rejected group payload");
        return ApiError::bad_request("Not a valid group")
            .into_response_with_diagnostics(ctx.request_id());
    }

    match state
        .attribution
        .post(&call_context(&ctx), ResourceKind::Group, body)
        .await
    {
        Ok(saved) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, FHIR_JSON_CONTENT_TYPE)],
            saved,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to save group");
            ApiError::server_issue(StatusCode::UNPROCESSABLE_ENTITY, "Failed to save group")
                .into_response_with_diagnostics(ctx.request_id())
        }
    }
}

pub async fn read() -> ApiError {
    ApiError::not_implemented("Reading a group is not supported")
}

pub async fn update() -> ApiError {
    ApiError::not_implemented("Updating a group is not supported")
}

pub async fn delete() -> ApiError {
    ApiError::not_implemented("Deleting a group is not supported")
}
