//! Create-group payload validation.
//!
//! A payload must pass a FHIR resource grammar check and then the domain
//! attribution shape: every member names a practitioner and a patient by
//! identifier. One bad member rejects the whole group.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use octofhir_fhirschema::{
    FhirVersion, embedded::get_schemas, types::ValidationError as SchemaError,
    validation::FhirValidator,
};
use serde_json::Value;
use thiserror::Error;

use crate::group::{Group, PATIENT_TYPE, PRACTITIONER_TYPE};

/// Canonical profile every create-group payload is checked against.
pub const GROUP_PROFILE: &str = "http://hl7.org/fhir/StructureDefinition/Group";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupValidationError {
    #[error("Group payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("Group payload is not a valid FHIR Group: {0}")]
    Structure(String),

    #[error("Should contain a provider identifier")]
    MissingProvider(usize),

    #[error("Should contain a patient identifier")]
    MissingPatient(usize),
}

/// Resource grammar check run before the domain shape is read.
#[async_trait]
pub trait ResourceValidator: Send + Sync {
    async fn validate(&self, resource: &Value) -> Result<(), GroupValidationError>;
}

// Building the validator copies the embedded R4 schema set, so it happens once.
static R4_VALIDATOR: LazyLock<Arc<FhirValidator>> = LazyLock::new(|| {
    Arc::new(FhirValidator::from_schemas(
        get_schemas(FhirVersion::R4).clone(),
        None,
    ))
});

/// R4 Group grammar backed by the embedded FHIR schemas. Unknown elements,
/// wrongly typed primitives, and missing required elements are rejected.
#[derive(Clone)]
pub struct SchemaValidator {
    inner: Arc<FhirValidator>,
}

impl SchemaValidator {
    pub fn r4() -> Self {
        Self {
            inner: R4_VALIDATOR.clone(),
        }
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::r4()
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("profile", &GROUP_PROFILE)
            .finish()
    }
}

fn describe(error: &SchemaError) -> String {
    let message = match &error.message {
        Some(msg) => msg.clone(),
        None => format!("Validation error: {}", error.error_type),
    };
    if error.path.is_empty() {
        return message;
    }
    let location = error
        .path
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => format!("[{n}]"),
            _ => v.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".");
    format!("{message} at {location}")
}

#[async_trait]
impl ResourceValidator for SchemaValidator {
    async fn validate(&self, resource: &Value) -> Result<(), GroupValidationError> {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some("Group") => {}
            Some(other) => {
                return Err(GroupValidationError::Structure(format!(
                    "unexpected resourceType {other}"
                )));
            }
            None => return Err(GroupValidationError::Structure("missing resourceType".into())),
        }

        let result = self
            .inner
            .validate(resource, vec![GROUP_PROFILE.to_string()])
            .await;
        if result.valid {
            return Ok(());
        }

        let details = result
            .errors
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join("; ");
        Err(GroupValidationError::Structure(details))
    }
}

/// Validate a create-group body and return the parsed domain group.
pub async fn validate_group(
    body: &[u8],
    validator: &dyn ResourceValidator,
) -> Result<Group, GroupValidationError> {
    let resource: Value =
        serde_json::from_slice(body).map_err(|e| GroupValidationError::Malformed(e.to_string()))?;
    validator.validate(&resource).await?;

    let group: Group = serde_json::from_value(resource)
        .map_err(|e| GroupValidationError::Structure(e.to_string()))?;

    for (index, member) in group.member.iter().enumerate() {
        if !member
            .practitioner_ref()
            .is_some_and(|r| r.is_identified(PRACTITIONER_TYPE))
        {
            return Err(GroupValidationError::MissingProvider(index));
        }
        if !member
            .entity
            .as_ref()
            .is_some_and(|r| r.is_identified(PATIENT_TYPE))
        {
            return Err(GroupValidationError::MissingPatient(index));
        }
    }

    Ok(group)
}
