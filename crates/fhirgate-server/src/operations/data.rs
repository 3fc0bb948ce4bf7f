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

pub const NDJSON_CONTENT_TYPE: &str = "application/ndjson";

/// One export output file, passed through from the job service.
pub async fn get_file(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(file_name) = ctx.file_name() else {
        return ApiError::bad_request("Failed to extract file name from url, please check the url")
            .into_response_with_diagnostics(ctx.request_id());
    };

    match state.data.get_file(&call_context(&ctx), file_name).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(file_name, error = %e, "failed to get export file");
            ApiError::not_found("Failed to find the file")
                .into_response_with_diagnostics(ctx.request_id())
        }
    }
}
