//! Record model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Column names of the remote sheet, in wire order.
pub const RECORD_COLUMNS: [&str; 8] = [
    "name",
    "title",
    "company",
    "profile_url",
    "requested_at",
    "follow_up_date",
    "tag",
    "notes",
];

/// Stable identity of a record: the canonical profile URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Parse and canonicalize a profile URL.
    ///
    /// Query string and fragment are dropped and trailing slashes trimmed, so
    /// `https://x.test/in/jane/?utm=1` and `https://x.test/in/jane` share a key.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "profile URL must not be empty".to_string(),
            ));
        }

        let mut url = Url::parse(trimmed)
            .map_err(|error| Error::InvalidInput(format!("invalid profile URL: {error}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(
                "profile URL must include http:// or https://".to_string(),
            ));
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    /// Get the string representation of this key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Write mode sent to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Create a new row
    Append,
    /// Overwrite the row previously written for this identity
    Update,
}

impl WriteMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight named fields supplied by the scraper.
///
/// This is the raw, unvalidated shape; [`Record::new`] canonicalizes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub requested_at: String,
    #[serde(default)]
    pub follow_up_date: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub notes: String,
}

/// An immutable snapshot of one profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    fields: RecordFields,
    written_at: DateTime<Utc>,
}

impl Record {
    /// Build a record stamped with the current time.
    pub fn new(fields: RecordFields) -> Result<Self> {
        Self::new_at(fields, Utc::now())
    }

    /// Build a record stamped with `now`.
    pub fn new_at(fields: RecordFields, now: DateTime<Utc>) -> Result<Self> {
        let key = RecordKey::parse(&fields.profile_url)?;

        let requested_at = match fields.requested_at.trim() {
            "" => now.to_rfc3339_opts(SecondsFormat::Millis, true),
            value => value.to_string(),
        };

        let fields = RecordFields {
            name: fields.name.trim().to_string(),
            title: fields.title.trim().to_string(),
            company: fields.company.trim().to_string(),
            profile_url: key.as_str().to_string(),
            requested_at,
            follow_up_date: normalize_date_iso(&fields.follow_up_date),
            tag: fields.tag.trim().to_string(),
            notes: fields.notes.trim().to_string(),
        };

        Ok(Self {
            key,
            fields,
            written_at: now,
        })
    }

    #[must_use]
    pub const fn key(&self) -> &RecordKey {
        &self.key
    }

    #[must_use]
    pub const fn fields(&self) -> &RecordFields {
        &self.fields
    }

    #[must_use]
    pub const fn written_at(&self) -> DateTime<Utc> {
        self.written_at
    }

    /// Field values in [`RECORD_COLUMNS`] order.
    #[must_use]
    pub fn values(&self) -> [&str; 8] {
        let fields = &self.fields;
        [
            &fields.name,
            &fields.title,
            &fields.company,
            &fields.profile_url,
            &fields.requested_at,
            &fields.follow_up_date,
            &fields.tag,
            &fields.notes,
        ]
    }
}

/// Normalize a date to `YYYY-MM-DD`.
///
/// Accepts plain dates and RFC 3339 timestamps; anything else becomes empty.
#[must_use]
pub fn normalize_date_iso(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.date_naive().format("%Y-%m-%d").to_string();
    }

    tracing::warn!(value = raw, "Ignoring unparseable follow-up date");
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fields(profile_url: &str) -> RecordFields {
        RecordFields {
            name: " Jane Doe ".to_string(),
            title: "Staff Engineer".to_string(),
            company: "Acme".to_string(),
            profile_url: profile_url.to_string(),
            follow_up_date: "2026-11-02T09:30:00Z".to_string(),
            tag: "rust".to_string(),
            ..RecordFields::default()
        }
    }

    #[test]
    fn record_key_strips_query_fragment_and_trailing_slash() {
        let key = RecordKey::parse(" https://www.example.com/in/jane-doe/?utm_source=x#top ")
            .unwrap();
        assert_eq!(key.as_str(), "https://www.example.com/in/jane-doe");
    }

    #[test]
    fn record_key_rejects_empty_and_non_http() {
        assert!(RecordKey::parse("   ").is_err());
        assert!(RecordKey::parse("ftp://example.com/in/jane").is_err());
        assert!(RecordKey::parse("not a url").is_err());
    }

    #[test]
    fn record_new_canonicalizes_fields() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let record = Record::new_at(fields("https://example.com/in/jane/"), now).unwrap();

        assert_eq!(record.key().as_str(), "https://example.com/in/jane");
        assert_eq!(record.fields().name, "Jane Doe");
        assert_eq!(record.fields().profile_url, "https://example.com/in/jane");
        assert_eq!(record.fields().requested_at, "2026-10-19T12:00:00.000Z");
        assert_eq!(record.fields().follow_up_date, "2026-11-02");
        assert_eq!(record.written_at(), now);
    }

    #[test]
    fn record_keeps_explicit_requested_at() {
        let mut raw = fields("https://example.com/in/jane");
        raw.requested_at = "2026-01-01T00:00:00.000Z".to_string();
        let record = Record::new(raw).unwrap();
        assert_eq!(record.fields().requested_at, "2026-01-01T00:00:00.000Z");
    }

    #[test]
    fn record_values_follow_column_order() {
        let record = Record::new(fields("https://example.com/in/jane")).unwrap();
        let values = record.values();
        assert_eq!(values.len(), RECORD_COLUMNS.len());
        assert_eq!(values[0], "Jane Doe");
        assert_eq!(values[3], "https://example.com/in/jane");
        assert_eq!(values[6], "rust");
    }

    #[test]
    fn record_fields_use_camel_case_on_the_wire() {
        let json = serde_json::to_value(fields("https://example.com/in/jane")).unwrap();
        assert!(json.get("profileUrl").is_some());
        assert!(json.get("followUpDate").is_some());
        assert!(json.get("profile_url").is_none());
    }

    #[test]
    fn normalize_date_iso_handles_formats() {
        assert_eq!(normalize_date_iso(""), "");
        assert_eq!(normalize_date_iso("2026-03-04"), "2026-03-04");
        assert_eq!(normalize_date_iso("2026-03-04T23:00:00+00:00"), "2026-03-04");
        assert_eq!(normalize_date_iso("next tuesday"), "");
    }
}
