//! Procedure metadata as stored in the JSON artifact

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Document-level fields of a procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Older autosave files used `sop_title`
    #[serde(default, alias = "sop_title")]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Absent or unparsable dates fall back to today
    #[serde(default = "today", with = "lenient_date")]
    pub creation_date: NaiveDate,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub scope: String,
    /// Stamped by every save
    #[serde(default, with = "lenient_timestamp")]
    pub last_saved: Option<NaiveDateTime>,
}

impl Metadata {
    /// Fresh metadata for a new procedure, dated today
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: String::new(),
            creation_date: today(),
            purpose: String::new(),
            scope: String::new(),
            last_saved: None,
        }
    }

    /// `last_saved` formatted for display
    pub fn last_saved_display(&self) -> Option<String> {
        self.last_saved
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
    }
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current local time truncated to whole seconds
pub fn now_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod lenient_date {
    use super::{today, DATE_FORMAT};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
            .unwrap_or_else(today))
    }
}

mod lenient_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()))
    }
}
