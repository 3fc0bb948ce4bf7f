//! Attribution Group model.
//!
//! Only the parts of the FHIR Group resource the gateway reads are modelled;
//! unknown fields are ignored on deserialization.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Extension carrying the practitioner a member is attributed to.
pub const ATTRIBUTED_PROVIDER_EXTENSION: &str =
    "http://hl7.org/fhir/us/davinci-atr/StructureDefinition/ext-attributedProvider";

pub const PRACTITIONER_TYPE: &str = "Practitioner";
pub const PATIENT_TYPE: &str = "Patient";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub member: Vec<GroupMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    #[serde(default)]
    pub extension: Vec<Extension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive: Option<bool>,
}

impl GroupMember {
    /// The attributed-provider reference, if the member carries one.
    pub fn practitioner_ref(&self) -> Option<&Reference> {
        self.extension
            .iter()
            .find(|ext| ext.url == ATTRIBUTED_PROVIDER_EXTENSION)
            .and_then(|ext| ext.value_reference.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_reference: Option<Reference>,
}

/// FHIR Reference type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    /// True when the reference declares `expected_type` and carries an identifier.
    pub fn is_identified(&self, expected_type: &str) -> bool {
        self.identifier.is_some() && self.reference_type.as_deref() == Some(expected_type)
    }

    fn identifier_value(&self) -> Option<&str> {
        self.identifier
            .as_ref()
            .and_then(|i| i.value.as_deref())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A stored group as returned by the attribution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupContainer {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub info: Group,
}

/// One provider-to-patient care relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub provider_npi: String,
    pub patient_mbi: String,
}

impl Group {
    /// One attribution pair per member, in member order.
    pub fn attribution_info(&self) -> Result<Vec<Attribution>> {
        self.member
            .iter()
            .enumerate()
            .map(|(index, member)| {
                let provider_npi = member
                    .practitioner_ref()
                    .and_then(Reference::identifier_value)
                    .ok_or_else(|| {
                        CoreError::invalid_resource(format!(
                            "member[{index}] has no attributed provider identifier"
                        ))
                    })?;
                let patient_mbi = member
                    .entity
                    .as_ref()
                    .and_then(Reference::identifier_value)
                    .ok_or_else(|| {
                        CoreError::invalid_resource(format!(
                            "member[{index}] has no patient identifier"
                        ))
                    })?;
                Ok(Attribution {
                    provider_npi: provider_npi.to_string(),
                    patient_mbi: patient_mbi.to_string(),
                })
            })
            .collect()
    }
}
