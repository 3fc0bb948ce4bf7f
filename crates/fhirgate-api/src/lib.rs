use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Content type used for every OperationOutcome body.
pub const FHIR_JSON_CONTENT_TYPE: &str = "application/fhir+json; charset=UTF-8";

/// Issue severities emitted by the gateway.
pub mod severity {
    pub const ERROR: &str = "error";
    pub const WARNING: &str = "warning";
}

/// Issue codes emitted by the gateway.
///
/// `Business Rule Violation` and `Exception` are not FHIR issue-type codes but
/// existing clients match on them literally.
pub mod issue_code {
    pub const BUSINESS_RULE_VIOLATION: &str = "Business Rule Violation";
    pub const EXCEPTION: &str = "Exception";
    pub const NOT_FOUND: &str = "not-found";
    pub const LOGIN: &str = "login";
    pub const NOT_SUPPORTED: &str = "not-supported";
}

/// Details text used for every fatal server issue.
pub const INTERNAL_SERVER_ERROR_TEXT: &str = "Internal Server Error";

// -------------------------
// OperationOutcome
// -------------------------

/// Minimal FHIR OperationOutcome representation for error responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationOutcome {
    pub issue: Vec<OperationOutcomeIssue>,
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str, // always "OperationOutcome"
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationOutcomeIssue {
    pub severity: &'static str,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    /// Free text; the request id when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IssueDetails {
    pub text: String,
}

impl OperationOutcome {
    pub fn single(severity: &'static str, code: &'static str, text: impl Into<String>) -> Self {
        Self::from_texts(severity, code, vec![text.into()])
    }

    /// One issue per text, all sharing severity and code.
    pub fn from_texts(severity: &'static str, code: &'static str, texts: Vec<String>) -> Self {
        Self {
            issue: texts
                .into_iter()
                .map(|text| OperationOutcomeIssue {
                    severity,
                    code,
                    details: Some(IssueDetails { text }),
                    diagnostics: None,
                })
                .collect(),
            resource_type: "OperationOutcome",
        }
    }

    /// Stamp the same diagnostics string on every issue.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        for issue in &mut self.issue {
            issue.diagnostics = Some(diagnostics.clone());
        }
        self
    }
}

// -------------------------
// ApiError
// -------------------------

/// Every failure the gateway can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client-caused; rendered with warning severity.
    #[error("Business rule violation: {}", .messages.join("; "))]
    BusinessViolation {
        status: StatusCode,
        messages: Vec<String>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// Internal inconsistency, collaborator failure, or unparseable input.
    #[error("Server issue: {message}")]
    ServerIssue { status: StatusCode, message: String },
}

impl ApiError {
    pub fn business_violation(status: StatusCode, msg: impl Into<String>) -> Self {
        Self::BusinessViolation {
            status,
            messages: vec![msg.into()],
        }
    }

    /// Several violations found in one pass, reported together.
    pub fn business_violations(status: StatusCode, messages: Vec<String>) -> Self {
        Self::BusinessViolation { status, messages }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::business_violation(StatusCode::BAD_REQUEST, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }
    pub fn server_issue(status: StatusCode, msg: impl Into<String>) -> Self {
        Self::ServerIssue {
            status,
            message: msg.into(),
        }
    }

    /// The catch-all 500 used when nothing more specific may leak to the client.
    pub fn generic_server_issue() -> Self {
        Self::server_issue(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR_TEXT)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BusinessViolation { status, .. } => *status,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::ServerIssue { status, .. } => *status,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        match self {
            ApiError::BusinessViolation { messages, .. } => OperationOutcome::from_texts(
                severity::WARNING,
                issue_code::BUSINESS_RULE_VIOLATION,
                messages.clone(),
            ),
            ApiError::NotFound(msg) => {
                OperationOutcome::single(severity::ERROR, issue_code::NOT_FOUND, msg)
            }
            ApiError::Unauthorized(msg) => {
                OperationOutcome::single(severity::ERROR, issue_code::LOGIN, msg)
            }
            ApiError::NotImplemented(msg) => {
                OperationOutcome::single(severity::ERROR, issue_code::NOT_SUPPORTED, msg)
            }
            ApiError::ServerIssue { message, .. } => {
                OperationOutcome::single(severity::ERROR, issue_code::EXCEPTION, message)
            }
        }
    }

    /// Render with an explicit diagnostics string (normally the request id).
    pub fn into_response_with_diagnostics(self, diagnostics: Option<&str>) -> Response {
        let diagnostics = diagnostics
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string());
        let outcome = self.to_operation_outcome().with_diagnostics(diagnostics);
        outcome_response(self.status_code(), &outcome)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_diagnostics(None)
    }
}

/// Serialize an OperationOutcome with the FHIR JSON content type.
pub fn outcome_response(status: StatusCode, outcome: &OperationOutcome) -> Response {
    let body = match serde_json::to_vec(outcome) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize OperationOutcome");
            let fallback = OperationOutcome::single(
                severity::ERROR,
                issue_code::EXCEPTION,
                INTERNAL_SERVER_ERROR_TEXT,
            );
            serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{}".to_vec())
        }
    };

    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(FHIR_JSON_CONTENT_TYPE),
    );
    response
}
