use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::error::{CoreError, Result};

/// `_since` layout: seconds precision with a mandatory signed `HH:MM` offset.
///
/// `Z` is not accepted; clients send `+00:00` (percent-encoded) instead.
pub const SINCE_LAYOUT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Parse a timestamp in the strict `_since` layout.
pub fn parse_since_layout(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, SINCE_LAYOUT).map_err(|e| {
        CoreError::invalid_date_time(format!("Failed to parse '{value}': {e}"))
    })
}

/// Format a timestamp in the `_since` layout, dropping sub-second precision.
pub fn format_since(datetime: OffsetDateTime) -> String {
    datetime
        .format(SINCE_LAYOUT)
        .unwrap_or_else(|_| datetime.unix_timestamp().to_string())
}

/// Parse any RFC 3339 timestamp, the form Provenance `recorded` values use.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        CoreError::invalid_date_time(format!("Failed to parse FHIR DateTime '{value}': {e}"))
    })
}
