use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A journal entry as returned by the API.
///
/// Reading is forgiving: a `null` field takes its default and the
/// timestamps are kept as the server wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entry {
    // -- Server-assigned --
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub updated_at: Option<String>,

    // -- User-authored --
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub action: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub motive: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub conscience_check: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub hearing_his_voice: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub losing_evil_desires: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub serving_others: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub service_blessed_others: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub reflection: String,
}

impl Entry {
    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn updated_time(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_timestamp)
    }
}

/// RFC 3339, or milliseconds since the epoch.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

mod lenient {
    use super::*;

    /// Strings as-is, numbers as their decimal text, anything else absent.
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Payload for `POST /api/entries`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub date: String,
    pub action: String,
    pub motive: String,
    pub conscience_check: bool,
    pub hearing_his_voice: bool,
    pub losing_evil_desires: bool,
    pub serving_others: bool,
    pub service_blessed_others: bool,
    pub reflection: String,
}

/// Payload for `PUT /api/entries/{id}`. Only the fields that are set are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conscience_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hearing_his_voice: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losing_evil_desires: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_others: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_blessed_others: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
}

impl EntryPatch {
    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<Entry> for NewEntry {
    /// Drops the server-assigned fields.
    fn from(entry: Entry) -> Self {
        Self {
            date: entry.date,
            action: entry.action,
            motive: entry.motive,
            conscience_check: entry.conscience_check,
            hearing_his_voice: entry.hearing_his_voice,
            losing_evil_desires: entry.losing_evil_desires,
            serving_others: entry.serving_others,
            service_blessed_others: entry.service_blessed_others,
            reflection: entry.reflection,
        }
    }
}
