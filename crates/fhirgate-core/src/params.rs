//! Single-value request validators.
//!
//! Each function turns one raw query parameter or header value into the
//! typed value the pipeline binds, or into a rejection message. The export
//! query validators never reject: invalid input degrades to an empty string
//! so the downstream job service sees "nothing requested".

use time::OffsetDateTime;

use crate::timestamp::parse_since_layout;

/// Resource types a bulk export may be filtered to.
pub const ACCEPTED_RESOURCE_TYPES: [&str; 2] = ["Coverage", "ExplanationOfBenefit"];

/// Bound when `_type` is absent.
pub const ALL_RESOURCES: &str = "Coverage,ExplanationOfBenefit";

pub const FHIR_NDJSON: &str = "application/fhir+ndjson";
pub const APPLICATION_NDJSON: &str = "application/ndjson";
pub const NDJSON: &str = "ndjson";

pub const PREFER_RESPOND_ASYNC: &str = "respond-async";

pub const INVALID_OUTPUT_FORMAT: &str =
    "'_outputFormat' query parameter must be 'application/fhir+ndjson', 'application/ndjson', or 'ndjson'";
pub const MISSING_PREFER: &str = "The 'Prefer' header is required and must be 'respond-async'";
pub const INVALID_PREFER: &str = "The 'Prefer' header must be 'respond-async'";

/// Canonical identifier system for Medicare Beneficiary Identifiers.
pub const MBI_SYSTEM: &str = "http://hl7.org/fhir/sid/us-mbi";

/// Look up `name` in a raw (still percent-encoded) query string.
///
/// Decoding follows form rules: `+` is a space and `%2B` is a plus sign.
/// The first occurrence wins.
pub fn query_param(raw_query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(raw_query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// `_type`: the sentinel when absent, the value when every entry is an
/// accepted resource type, otherwise the empty string.
pub fn export_types(value: Option<&str>) -> String {
    match value {
        None => ALL_RESOURCES.to_string(),
        Some(types) if is_accepted_type_list(types) => types.to_string(),
        Some(types) => {
            tracing::debug!(types, "unrecognized _type filter");
            String::new()
        }
    }
}

fn is_accepted_type_list(types: &str) -> bool {
    !types.is_empty()
        && types
            .split(',')
            .all(|t| ACCEPTED_RESOURCE_TYPES.contains(&t))
}

/// `_since`: the decoded value when it parses in the `_since` layout and is
/// not after `now`, otherwise the empty string.
pub fn export_since(value: Option<&str>, now: OffsetDateTime) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match parse_since_layout(value) {
        Ok(since) if since <= now => value.to_string(),
        Ok(_) => {
            tracing::debug!(since = value, "_since is in the future");
            String::new()
        }
        Err(e) => {
            tracing::debug!(since = value, error = %e, "_since does not parse");
            String::new()
        }
    }
}

/// `_outputFormat`: blank means fhir+ndjson; otherwise one of the three
/// ndjson spellings, compared case-insensitively. Returns the effective format.
pub fn output_format(value: Option<&str>) -> Result<String, &'static str> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(FHIR_NDJSON.to_string());
    }
    if [FHIR_NDJSON, APPLICATION_NDJSON, NDJSON]
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(value))
    {
        Ok(value.to_string())
    } else {
        Err(INVALID_OUTPUT_FORMAT)
    }
}

/// `Prefer` must be exactly `respond-async`.
pub fn prefer_respond_async(value: Option<&str>) -> Result<(), &'static str> {
    match value {
        None | Some("") => Err(MISSING_PREFER),
        Some(PREFER_RESPOND_ASYNC) => Ok(()),
        Some(_) => Err(INVALID_PREFER),
    }
}

/// Why an MBI identifier pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MbiRejection {
    #[error("Missing identifier system header")]
    MissingSystem,
    #[error("Identifier system must be http://hl7.org/fhir/sid/us-mbi")]
    WrongSystem,
    #[error("Missing identifier value header")]
    MissingValue,
}

/// The MBI from an identifier (system, value) header pair.
pub fn mbi_identifier(system: Option<&str>, value: Option<&str>) -> Result<String, MbiRejection> {
    match system {
        None | Some("") => return Err(MbiRejection::MissingSystem),
        Some(MBI_SYSTEM) => {}
        Some(_) => return Err(MbiRejection::WrongSystem),
    }
    match value.map(str::trim) {
        Some(mbi) if !mbi.is_empty() => Ok(mbi.to_string()),
        _ => Err(MbiRejection::MissingValue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::format_since;
    use time::Duration;
    use time::macros::datetime;

    const QUERY: &str = "_type=Coverage,ExplanationOfBenefit&_since=2012-01-02T12:12:12-05:00";

    #[test]
    fn query_param_decodes_form_style() {
        assert_eq!(
            query_param(Some("_since=2012-01-02T12:12:12%2b05:00"), "_since").as_deref(),
            Some("2012-01-02T12:12:12+05:00")
        );
        assert_eq!(
            query_param(Some("_since=2012-01-02T12:12:12+05:00"), "_since").as_deref(),
            Some("2012-01-02T12:12:12 05:00")
        );
        assert_eq!(
            query_param(Some(QUERY), "_type").as_deref(),
            Some("Coverage,ExplanationOfBenefit")
        );
        assert_eq!(query_param(Some(QUERY), "_outputFormat"), None);
        assert_eq!(query_param(None, "_type"), None);
        assert_eq!(query_param(Some("_type"), "_type").as_deref(), Some(""));
    }

    #[test]
    fn query_param_decodes_keys_and_keeps_first_value() {
        let raw = "%5Ftype=Coverage&_type=ExplanationOfBenefit&_outputFormat=application%2Ffhir%2Bndjson";
        assert_eq!(query_param(Some(raw), "_type").as_deref(), Some("Coverage"));
        assert_eq!(
            query_param(Some(raw), "_outputFormat").as_deref(),
            Some(FHIR_NDJSON)
        );
        assert_eq!(query_param(Some("a=%zz"), "a").as_deref(), Some("%zz"));
    }

    #[test]
    fn export_types_accepts_known_subsets() {
        assert_eq!(
            export_types(Some("Coverage,ExplanationOfBenefit")),
            "Coverage,ExplanationOfBenefit"
        );
        assert_eq!(export_types(Some("Coverage")), "Coverage");
        assert_eq!(
            export_types(Some("ExplanationOfBenefit,Coverage")),
            "ExplanationOfBenefit,Coverage"
        );
    }

    #[test]
    fn export_types_degrades_to_empty() {
        for bad in ["foobar", "", "Coverage,", "Coverage,Patient", "coverage", " Coverage"] {
            assert_eq!(export_types(Some(bad)), "", "input {bad:?}");
        }
        assert_eq!(export_types(None), ALL_RESOURCES);
    }

    #[test]
    fn export_since_rules() {
        let now = datetime!(2021-06-01 00:00:00 UTC);
        assert_eq!(
            export_since(Some("2012-01-02T12:12:12-05:00"), now),
            "2012-01-02T12:12:12-05:00"
        );
        assert_eq!(
            export_since(Some("2012-01-02T12:12:12+05:00"), now),
            "2012-01-02T12:12:12+05:00"
        );
        assert_eq!(export_since(Some("2012-01-02T12:12:12 05:00"), now), "");
        assert_eq!(export_since(Some("foobar"), now), "");
        assert_eq!(export_since(None, now), "");

        let future = format_since(now + Duration::hours(3));
        assert_eq!(export_since(Some(&future), now), "");
        let exactly_now = format_since(now);
        assert_eq!(export_since(Some(&exactly_now), now), exactly_now);
    }

    #[test]
    fn output_format_rules() {
        assert_eq!(output_format(None).unwrap(), FHIR_NDJSON);
        assert_eq!(output_format(Some("  ")).unwrap(), FHIR_NDJSON);
        assert_eq!(output_format(Some("ndjson")).unwrap(), "ndjson");
        assert_eq!(
            output_format(Some("Application/NDJSON")).unwrap(),
            "Application/NDJSON"
        );
        assert_eq!(output_format(Some("text/csv")), Err(INVALID_OUTPUT_FORMAT));
    }

    #[test]
    fn prefer_rules() {
        assert_eq!(prefer_respond_async(None), Err(MISSING_PREFER));
        assert_eq!(prefer_respond_async(Some("")), Err(MISSING_PREFER));
        assert_eq!(prefer_respond_async(Some("respond-sync")), Err(INVALID_PREFER));
        assert_eq!(prefer_respond_async(Some("respond-async")), Ok(()));
    }

    #[test]
    fn mbi_rules() {
        assert_eq!(mbi_identifier(None, None), Err(MbiRejection::MissingSystem));
        assert_eq!(
            mbi_identifier(Some("my-system"), Some("mbi")),
            Err(MbiRejection::WrongSystem)
        );
        assert_eq!(
            mbi_identifier(Some(MBI_SYSTEM), None),
            Err(MbiRejection::MissingValue)
        );
        assert_eq!(mbi_identifier(Some(MBI_SYSTEM), Some("mbi")).unwrap(), "mbi");
    }
}
