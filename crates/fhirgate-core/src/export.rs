use serde::{Deserialize, Serialize};

use crate::group::Attribution;

/// Job submission for one `Group/{id}/$export` call.
///
/// Built once per call and handed to the job service as JSON; never stored
/// by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub output_format: String,
    pub since: String,
    #[serde(rename = "type")]
    pub resource_types: String,
    pub mbis: Vec<String>,
    /// Comma-joined, one entry per attribution pair.
    pub provider_npi: String,
    pub group_id: String,
}

impl ExportRequest {
    pub fn from_attributions(
        group_id: impl Into<String>,
        output_format: impl Into<String>,
        since: impl Into<String>,
        resource_types: impl Into<String>,
        attributions: &[Attribution],
    ) -> Self {
        let (providers, patients): (Vec<&str>, Vec<String>) = attributions
            .iter()
            .map(|a| (a.provider_npi.as_str(), a.patient_mbi.clone()))
            .unzip();

        Self {
            output_format: output_format.into(),
            since: since.into(),
            resource_types: resource_types.into(),
            mbis: patients,
            provider_npi: providers.join(","),
            group_id: group_id.into(),
        }
    }
}
