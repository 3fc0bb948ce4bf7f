use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use fhirgate_api::{ApiError, FHIR_JSON_CONTENT_TYPE};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "FhirGate",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

/// CapabilityStatement advertising group creation and group export.
pub async fn metadata(State(state): State<AppState>) -> impl IntoResponse {
    let api = &state.config.api;
    let body = json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "fhirVersion": api.fhir_release().unwrap_or_default(),
        "format": ["application/fhir+json"],
        "software": { "name": "FhirGate", "version": env!("CARGO_PKG_VERSION") },
        "implementation": {
            "description": "FHIR bulk export gateway",
            "url": api.base_path,
        },
        "rest": [{
            "mode": "server",
            "resource": [{
                "type": "Group",
                "interaction": [{ "code": "create" }],
                "operation": [{
                    "name": "export",
                    "definition": "http://hl7.org/fhir/uv/bulkdata/OperationDefinition/group-export",
                }],
            }],
        }],
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, FHIR_JSON_CONTENT_TYPE)],
        Json(body),
    )
}

pub async fn fallback() -> ApiError {
    ApiError::not_found("Resource not found")
}
