//! `Group/{groupID}/$export`: turns a stored group into a bulk-export job.

use axum::{
    Extension,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use fhirgate_api::ApiError;
use fhirgate_client::ResourceKind;
use fhirgate_core::{
    ExportRequest, GroupContainer,
    params::{self, query_param},
};
use tracing::instrument;

use super::call_context;
use crate::pipeline::RequestContext;
use crate::pipeline::stages::{OUTPUT_FORMAT_PARAM, PREFER_HEADER};
use crate::server::AppState;

pub async fn group_export(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let prefer = headers.get(PREFER_HEADER).and_then(|v| v.to_str().ok());
    let format = query_param(query.as_deref(), OUTPUT_FORMAT_PARAM);
    match export(&state, &ctx, format.as_deref(), prefer).await {
        Ok(response) => response,
        Err(err) => err.into_response_with_diagnostics(ctx.request_id()),
    }
}

#[instrument(skip_all, fields(group_id = ctx.group_id()))]
async fn export(
    state: &AppState,
    ctx: &RequestContext,
    output_format: Option<&str>,
    prefer: Option<&str>,
) -> Result<Response, ApiError> {
    let group_id = ctx.group_id().ok_or_else(|| {
        ApiError::bad_request("Failed to extract group id from url, please check the url")
    })?;
    let call = call_context(ctx);

    let raw = state
        .attribution
        .get(&call, ResourceKind::Group, group_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to get the group");
            ApiError::not_found("Failed to find the group")
        })?;

    export_preferences(output_format, prefer)?;

    let container: GroupContainer = serde_json::from_slice(&raw).map_err(|e| {
        tracing::error!(error = %e, "failed to parse the stored group");
        ApiError::generic_server_issue()
    })?;
    if container.id != group_id {
        tracing::error!(stored_id = %container.id, "stored group id does not match the request");
        return Err(ApiError::generic_server_issue());
    }

    let attributions = container.info.attribution_info().map_err(|e| {
        tracing::error!(error = %e, "failed to read attribution pairs");
        ApiError::generic_server_issue()
    })?;
    let request = ExportRequest::from_attributions(
        container.id.as_str(),
        output_format.unwrap_or_default(),
        ctx.since().unwrap_or_default(),
        ctx.resource_types().unwrap_or_default(),
        &attributions,
    );

    let job_id = state.jobs.export(&call, &request).await.map_err(|e| {
        tracing::error!(error = %e, "failed to start the export job");
        ApiError::generic_server_issue()
    })?;
    tracing::info!(job_id = %job_id, patients = request.mbis.len(), "export job accepted");

    let location = format!(
        "{}/Jobs/{}",
        state.config.api.base_path.trim_end_matches('/'),
        job_id
    );
    Ok((StatusCode::ACCEPTED, [(header::CONTENT_LOCATION, location)]).into_response())
}

/// Check `_outputFormat` and `Prefer` together.
///
/// Both checks always run; every violation becomes its own issue. A blank
/// format passes, but the job still receives the value exactly as queried.
pub fn export_preferences(
    output_format: Option<&str>,
    prefer: Option<&str>,
) -> Result<(), ApiError> {
    let format = params::output_format(output_format);
    let prefer = params::prefer_respond_async(prefer);

    match (format, prefer) {
        (Ok(_), Ok(())) => Ok(()),
        (format, prefer) => {
            let messages = [format.err(), prefer.err()]
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect();
            Err(ApiError::business_violations(StatusCode::BAD_REQUEST, messages))
        }
    }
}
