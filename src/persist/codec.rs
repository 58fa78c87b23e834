//! Tagged date encoding shared by every persisted document.
//!
//! JSON has no date type, so each date is written as
//! `{"__type": "Date", "value": "<ISO-8601>"}`. The local cache, the external
//! backup file and import/export all go through this module.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum DateTag {
    Date,
}

/// Wire form of a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedDate {
    #[serde(rename = "__type")]
    kind: DateTag,
    value: String,
}

impl TaggedDate {
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        TaggedDate {
            kind: DateTag::Date,
            value: dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    pub fn from_date(d: NaiveDate) -> Self {
        Self::from_datetime(&d.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, String> {
        parse_iso(&self.value)
    }

    pub fn to_date(&self) -> Result<NaiveDate, String> {
        self.to_datetime().map(|dt| dt.date_naive())
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| format!("invalid ISO-8601 date: {value}"))
}

/// `#[serde(with = "codec::datetime")]` for `DateTime<Utc>` fields.
pub mod datetime {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        TaggedDate::from_datetime(dt).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        TaggedDate::deserialize(d)?.to_datetime().map_err(D::Error::custom)
    }
}

/// `#[serde(with = "codec::date_opt")]` for `Option<NaiveDate>` fields.
pub mod date_opt {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        d.map(TaggedDate::from_date).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Option::<TaggedDate>::deserialize(d)?
            .map(|t| t.to_date())
            .transpose()
            .map_err(D::Error::custom)
    }
}

/// Serialize a forest to the persisted document form.
pub fn encode_forest(forest: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(forest)
}

/// Parse a persisted document back into a forest.
pub fn decode_forest(data: &str) -> serde_json::Result<Vec<Task>> {
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Attachment, Note};
    use crate::fields::{Priority, RecurrenceKind, Status};
    use crate::task::Recurrence;
    use chrono::TimeZone;

    #[test]
    fn test_tagged_shape() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        let v = serde_json::to_value(TaggedDate::from_datetime(&dt)).unwrap();
        assert_eq!(v["__type"], "Date");
        assert_eq!(v["value"], "2025-01-01T12:30:00Z");
    }

    #[test]
    fn test_parse_accepts_bare_dates() {
        let dt = parse_iso("2025-03-04").unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert!(parse_iso("yesterday").is_err());
    }

    #[test]
    fn test_forest_round_trip_keeps_dates() {
        let mut root = Task::new("Plan trip");
        root.due_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        root.priority = Priority::High;
        root.recurrence = Some(Recurrence { kind: RecurrenceKind::Weekly, interval: 1 });
        let note = Note::new("book hotel", &root);
        root.notes.push(note);
        root.attachments.push(Attachment::from_bytes("a.txt", "text/plain", b"hello"));
        let mut child = root.child("Pack");
        child.status = Status::Done;
        child.completed = true;
        root.sub_tasks.push(child);

        let forest = vec![root];
        let text = encode_forest(&forest).unwrap();
        assert!(text.contains("\"__type\": \"Date\""));
        assert_eq!(decode_forest(&text).unwrap(), forest);
    }
}
