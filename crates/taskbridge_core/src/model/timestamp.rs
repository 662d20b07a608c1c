use crate::error::ModelError;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const COMPACT: &[BorrowedFormatItem<'_>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");

/// Parses the point-in-time encodings the task tool emits or accepts.
///
/// The export uses the compact UTC form `20250301T143000Z`. RFC 3339 and
/// naive ISO 8601 (read as UTC) are accepted as well.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let trimmed = value.trim();

    if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, COMPACT) {
        return Some(parsed.assume_utc());
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed);
    }

    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(trimmed, &naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Renders a timestamp in the export's compact UTC form.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    let utc = value.to_offset(UtcOffset::UTC);
    utc.format(COMPACT).unwrap_or_else(|_| utc.to_string())
}

/// Converts epoch seconds, as stored by the local database, into a timestamp.
pub fn from_epoch_seconds(value: &str) -> Option<OffsetDateTime> {
    let seconds = value.trim().parse::<i64>().ok()?;
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

pub(crate) fn optional_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<OffsetDateTime>, ModelError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| ModelError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            }),
    }
}

/// `entry` and `modified` must be present once a record carries a uuid.
pub(crate) fn persisted_timestamp(
    field: &'static str,
    value: Option<&str>,
    persisted: bool,
) -> Result<Option<OffsetDateTime>, ModelError> {
    match value {
        None if persisted => Err(ModelError::MissingField(field)),
        other => optional_timestamp(field, other),
    }
}
