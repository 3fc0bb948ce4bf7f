//! Reference and id helpers.
//!
//! Provenance agents name the asserting organization with a relative
//! reference of the form `Organization/<id>`. Anything else (absolute URLs,
//! other resource types, versioned references) is rejected.

use std::sync::LazyLock;

use regex::Regex;

const ORGANIZATION_PREFIX: &str = "Organization/";

/// FHIR `id` datatype: 1-64 characters from `[A-Za-z0-9-.]`.
static FHIR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("valid id regex"));

/// Export output file names: no separators, no leading dot.
static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_\-.]{0,254}$").expect("valid file name regex")
});

pub fn is_valid_id(id: &str) -> bool {
    FHIR_ID.is_match(id)
}

pub fn is_valid_file_name(name: &str) -> bool {
    FILE_NAME.is_match(name)
}

/// Extract `<id>` from `Organization/<id>`.
///
/// ```
/// use fhirgate_core::organization_id_from_reference;
///
/// assert_eq!(
///     organization_id_from_reference("Organization/c5a40867-011a-43f9-996e-aa92207fbbe2"),
///     Some("c5a40867-011a-43f9-996e-aa92207fbbe2")
/// );
/// assert_eq!(organization_id_from_reference("Organizations/123"), None);
/// ```
pub fn organization_id_from_reference(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(ORGANIZATION_PREFIX)
        .filter(|id| is_valid_id(id))
}
