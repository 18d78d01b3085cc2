use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

pub const FIELD_STATUS: &str = "status";
pub const FIELD_UPDATED_AT: &str = "updated_at";
pub const FIELD_UPDATED_BY: &str = "updated_by";

/// Statuses after which a worker no longer holds the record.
pub const FINISHED_STATUSES: &[&str] = &["done", "failed"];

/// Layouts accepted for `updated_at` when it carries no UTC offset.
/// Offset-less values are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%b %d, %Y %H:%M:%S%.f",
];

/// A job record as stored in the hash at `key`.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub key: String,
    fields: HashMap<String, String>,
}

impl JobRecord {
    pub fn new(key: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.field(FIELD_STATUS)
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.field(FIELD_UPDATED_BY)
    }

    /// Parsed `updated_at`, or `None` if missing or unreadable.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.field(FIELD_UPDATED_AT).and_then(parse_timestamp)
    }

    pub fn is_finished(&self) -> bool {
        self.status()
            .is_some_and(|status| FINISHED_STATUSES.contains(&status))
    }

    /// Seconds elapsed between `updated_at` and `now`.
    ///
    /// A record without a usable timestamp is treated as just updated (age 0).
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        match self.updated_at() {
            Some(updated_at) => (now - updated_at).num_milliseconds() as f64 / 1000.0,
            None => {
                if let Some(raw) = self.field(FIELD_UPDATED_AT) {
                    tracing::warn!(
                        key = %self.key,
                        updated_at = raw,
                        "Unreadable updated_at, treating record as fresh"
                    );
                }
                0.0
            }
        }
    }
}

/// Parse an ISO-8601 timestamp, with or without a UTC offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(fields: &[(&str, &str)]) -> JobRecord {
        JobRecord::new(
            "predict:x.tiff",
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn parse_rfc3339_with_offset() {
        let ts = parse_timestamp("2019-05-01T12:30:00.250000+00:00").unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(ts, expected + Duration::milliseconds(250));

        let ts = parse_timestamp("2019-05-01T14:30:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 5, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn parse_naive_iso_as_utc() {
        let expected = Utc.with_ymd_and_hms(2019, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2019-05-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2019-05-01 12:30:00.000000"), Some(expected));
    }

    #[test]
    fn parse_legacy_layout() {
        let expected = Utc.with_ymd_and_hms(2019, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("May 01, 2019 12:30:00.000000"), Some(expected));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("1556713800000").is_none());
    }

    #[test]
    fn finished_statuses() {
        assert!(record(&[("status", "done")]).is_finished());
        assert!(record(&[("status", "failed")]).is_finished());
        assert!(!record(&[("status", "new")]).is_finished());
        assert!(!record(&[("status", "predicting")]).is_finished());
        assert!(!record(&[]).is_finished());
    }

    #[test]
    fn age_from_updated_at() {
        let now = Utc::now();
        let updated = (now - Duration::minutes(60)).to_rfc3339();
        let r = record(&[("status", "new"), ("updated_at", &updated)]);
        let age = r.age_seconds(now);
        assert!((age - 3600.0).abs() < 1.0, "age was {}", age);
    }

    #[test]
    fn missing_or_bad_updated_at_is_fresh() {
        let now = Utc::now();
        assert_eq!(record(&[("status", "new")]).age_seconds(now), 0.0);
        assert_eq!(
            record(&[("status", "new"), ("updated_at", "soon")]).age_seconds(now),
            0.0
        );
    }

    #[test]
    fn exposes_updated_by() {
        let r = record(&[("updated_by", "consumer-abc")]);
        assert_eq!(r.updated_by(), Some("consumer-abc"));
        assert_eq!(r.status(), None);
    }
}
