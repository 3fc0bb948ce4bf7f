//! Domain types and pure validators for the FhirGate bulk-export gateway.
//!
//! Nothing in this crate performs I/O. Every validator takes its inputs,
//! including the current time, as arguments.

pub mod error;
pub mod export;
pub mod group;
pub mod group_validation;
pub mod params;
pub mod provenance;
pub mod reference;
pub mod timestamp;

pub use error::{CoreError, Result};
pub use export::ExportRequest;
pub use group::{Attribution, Group, GroupContainer, GroupMember, Identifier, Reference};
pub use group_validation::{
    GROUP_PROFILE, GroupValidationError, ResourceValidator, SchemaValidator, validate_group,
};
pub use provenance::{ProvenanceDocument, ProvenanceError, validate_provenance};
pub use reference::{is_valid_file_name, is_valid_id, organization_id_from_reference};
pub use timestamp::{format_since, now_utc, parse_since_layout};
