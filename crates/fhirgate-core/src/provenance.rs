//! Provenance assertion validation.
//!
//! A client proves why it is acting on behalf of an organization by sending
//! a Provenance resource in a request header. Checks run in a fixed order and
//! the first failure wins.

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::reference::organization_id_from_reference;
use crate::timestamp::parse_rfc3339;

pub const PROVENANCE_RESOURCE_TYPE: &str = "Provenance";
pub const REASON_TREATMENT: &str = "TREAT";
pub const ROLE_AGENT: &str = "AGNT";

/// How far back `recorded` may lie.
pub const RECORDED_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceDocument {
    pub resource_type: String,
    pub recorded: String,
    #[serde(default)]
    pub reason: Vec<CodeableConcept>,
    #[serde(default)]
    pub agent: Vec<ProvenanceAgent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
}

impl CodeableConcept {
    fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|c| c.code.as_deref() == Some(code))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Coding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProvenanceAgent {
    #[serde(default)]
    pub role: Vec<CodeableConcept>,
    #[serde(default)]
    pub who: Option<WhoReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WhoReference {
    #[serde(default)]
    pub reference: Option<String>,
}

impl ProvenanceAgent {
    fn is_agent(&self) -> bool {
        self.role.iter().any(|r| r.has_code(ROLE_AGENT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvenanceError {
    /// Unreadable document: bad JSON, a resourceType other than Provenance,
    /// or a `recorded` value that is not an RFC 3339 timestamp.
    #[error("Malformed provenance: {0}")]
    Malformed(String),

    #[error("Recorded timestamp invalid because it's outside the 24 hr window")]
    OutsideWindow,

    #[error("Invalid reason")]
    InvalidReason,

    #[error("Invalid role")]
    InvalidRole,

    #[error("Invalid who reference")]
    InvalidWhoReference,

    #[error("No organization bound to the request")]
    OrganizationUnbound,

    #[error("Org in Provenance not valid")]
    OrganizationMismatch,
}

impl ProvenanceError {
    /// Fatal errors are server faults, not client rule violations.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::OrganizationUnbound)
    }
}

/// Validate a raw provenance header value against the bound organization.
pub fn validate_provenance(
    raw: &str,
    org_id: Option<&str>,
    now: OffsetDateTime,
) -> Result<ProvenanceDocument, ProvenanceError> {
    let doc: ProvenanceDocument =
        serde_json::from_str(raw).map_err(|e| ProvenanceError::Malformed(e.to_string()))?;
    if doc.resource_type != PROVENANCE_RESOURCE_TYPE {
        return Err(ProvenanceError::Malformed(format!(
            "expected resourceType Provenance, got {}",
            doc.resource_type
        )));
    }

    let recorded =
        parse_rfc3339(&doc.recorded).map_err(|e| ProvenanceError::Malformed(e.to_string()))?;
    if recorded > now || recorded < now - RECORDED_WINDOW {
        return Err(ProvenanceError::OutsideWindow);
    }

    if !doc.reason.iter().any(|r| r.has_code(REASON_TREATMENT)) {
        return Err(ProvenanceError::InvalidReason);
    }

    let agent = doc
        .agent
        .iter()
        .find(|a| a.is_agent())
        .ok_or(ProvenanceError::InvalidRole)?;

    let asserted_org = agent
        .who
        .as_ref()
        .and_then(|who| who.reference.as_deref())
        .and_then(organization_id_from_reference)
        .ok_or(ProvenanceError::InvalidWhoReference)?;

    match org_id {
        None => Err(ProvenanceError::OrganizationUnbound),
        Some(bound) if bound == asserted_org => Ok(doc),
        Some(_) => Err(ProvenanceError::OrganizationMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::format_since;
    use time::macros::datetime;

    const ORG: &str = "c5a40867-011a-43f9-996e-aa92207fbbe2";

    fn now() -> OffsetDateTime {
        datetime!(2021-06-01 12:00:00 UTC)
    }

    fn header(recorded: OffsetDateTime, reason: &str, role: &str, who: &str) -> String {
        serde_json::json!({
            "resourceType": "Provenance",
            "recorded": format_since(recorded),
            "reason": [{ "coding": [{ "system": "http://hl7.org/fhir/v3/ActReason", "code": reason }] }],
            "agent": [{
                "role": [{ "coding": [{ "system": "http://hl7.org/fhir/v3/RoleClass", "code": role }] }],
                "who": { "reference": who }
            }]
        })
        .to_string()
    }

    fn valid(recorded: OffsetDateTime) -> String {
        header(recorded, "TREAT", "AGNT", &format!("Organization/{ORG}"))
    }

    #[test]
    fn accepts_matching_org() {
        let doc = validate_provenance(&valid(now()), Some(ORG), now()).unwrap();
        assert_eq!(doc.resource_type, "Provenance");
        assert_eq!(doc.agent.len(), 1);
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = validate_provenance("{not json", Some(ORG), now()).unwrap_err();
        assert!(matches!(err, ProvenanceError::Malformed(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn wrong_resource_type_is_malformed() {
        let raw = valid(now()).replace("\"Provenance\"", "\"Patient\"");
        let err = validate_provenance(&raw, Some(ORG), now()).unwrap_err();
        assert!(matches!(err, ProvenanceError::Malformed(_)));
    }

    #[test]
    fn unparseable_recorded_is_malformed() {
        let mut doc: serde_json::Value = serde_json::from_str(&valid(now())).unwrap();
        doc["recorded"] = serde_json::json!("yesterday");
        let err = validate_provenance(&doc.to_string(), Some(ORG), now()).unwrap_err();
        assert!(matches!(err, ProvenanceError::Malformed(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn recorded_window() {
        let err = validate_provenance(&valid(now() - Duration::hours(48)), Some(ORG), now())
            .unwrap_err();
        assert_eq!(err, ProvenanceError::OutsideWindow);
        assert_eq!(
            err.to_string(),
            "Recorded timestamp invalid because it's outside the 24 hr window"
        );

        let err = validate_provenance(&valid(now() + Duration::minutes(5)), Some(ORG), now())
            .unwrap_err();
        assert_eq!(err, ProvenanceError::OutsideWindow);

        assert!(validate_provenance(&valid(now() - Duration::hours(23)), Some(ORG), now()).is_ok());
    }

    #[test]
    fn reason_must_be_treatment() {
        let raw = header(now(), "MEET", "AGNT", &format!("Organization/{ORG}"));
        let err = validate_provenance(&raw, Some(ORG), now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid reason");
        assert!(!err.is_fatal());
    }

    #[test]
    fn role_must_be_agent() {
        let raw = header(now(), "TREAT", "AGENNT", &format!("Organization/{ORG}"));
        let err = validate_provenance(&raw, Some(ORG), now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid role");
    }

    #[test]
    fn who_reference_prefix() {
        let raw = header(now(), "TREAT", "AGNT", &format!("Organizations/{ORG}"));
        let err = validate_provenance(&raw, Some(ORG), now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid who reference");
    }

    #[test]
    fn org_must_match_bound_org() {
        let err = validate_provenance(&valid(now()), Some("blah blah blah"), now()).unwrap_err();
        assert_eq!(err.to_string(), "Org in Provenance not valid");
        assert!(!err.is_fatal());
    }

    #[test]
    fn unbound_org_is_fatal() {
        let err = validate_provenance(&valid(now()), None, now()).unwrap_err();
        assert_eq!(err, ProvenanceError::OrganizationUnbound);
        assert!(err.is_fatal());
    }

    #[test]
    fn earlier_checks_win() {
        // stale and wrong reason: the window check runs first
        let raw = header(now() - Duration::hours(48), "MEET", "AGENNT", "nope");
        let err = validate_provenance(&raw, Some(ORG), now()).unwrap_err();
        assert_eq!(err, ProvenanceError::OutsideWindow);
    }
}
