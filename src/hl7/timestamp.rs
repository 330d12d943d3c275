//! HL7 `DTM` date/time values.

use crate::hl7::Hl7Error;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

/// The current UTC instant as ISO-8601 with millisecond precision, e.g. `2025-04-01T18:51:34.733Z`.
pub fn iso_now() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current UTC instant in compact `YYYYMMDDhhmmss` form.
pub fn now() -> String {
	compact(&iso_now())
}

/// Characters `[start, start + len)` of `s`, clamped to its length like `String.substr`.
fn substr(s: &str, start: usize, len: usize) -> &str {
	let end = s.len().min(start + len);
	s.get(start..end).unwrap_or_default()
}

/// Truncates an ISO-8601 timestamp to `YYYYMMDDhhmmss` by picking fixed character positions.
///
/// The input is not validated: shorter inputs simply yield shorter outputs.
pub fn compact(iso: &str) -> String {
	[(0, 4), (5, 2), (8, 2), (11, 2), (14, 2), (17, 2)]
		.into_iter()
		.map(|(start, len)| substr(iso, start, len))
		.collect()
}

/// `YYYY-MM-DD` to `YYYYMMDD`, with the same positional truncation as [`compact`].
pub fn compact_date(date: &str) -> String {
	[(0, 4), (5, 2), (8, 2)]
		.into_iter()
		.map(|(start, len)| substr(date, start, len))
		.collect()
}

/// Parses a `DTM` value with day, minute or second precision.
pub fn parse_date_time(value: &str) -> Result<NaiveDateTime, Hl7Error> {
	match value.len() {
		8 => Ok(NaiveDate::parse_from_str(value, "%Y%m%d")?.and_time(NaiveTime::MIN)),
		12 => Ok(NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M")?),
		14 => Ok(NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S")?),
		_ => Err(Hl7Error::UnsupportedDateTime(value.to_owned())),
	}
}
