use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use fhirgate_api::ApiError;

use super::call_context;
use crate::pipeline::RequestContext;
use crate::server::AppState;

pub const JOB_STATUS_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Job status document, passed through from the job service.
pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(job_id) = ctx.job_id() else {
        return ApiError::bad_request("Failed to extract job id from url, please check the url")
            .into_response_with_diagnostics(ctx.request_id());
    };

    match state.jobs.status(&call_context(&ctx), job_id).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JOB_STATUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(job_id, error = %e, "failed to get job status");
            ApiError::not_found("Failed to find the job")
                .into_response_with_diagnostics(ctx.request_id())
        }
    }
}
