use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::Entry;

// -- Entries --

/// Envelope of `GET /api/entries`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntriesResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub entries: Option<Vec<Entry>>,
}

/// Envelope of the single-entry endpoints (get, create, update).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub entry: Option<Entry>,
}

// -- Errors --

/// Body of a non-2xx response. Servers are not consistent about the shape, so
/// both fields are kept as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ErrorBody {
    /// `message`, then `error`; only non-empty strings count.
    pub fn reason(&self) -> Option<&str> {
        [&self.message, &self.error]
            .into_iter()
            .filter_map(|field| field.as_ref().and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }
}

// -- Health --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn reason_prefers_message() {
        assert_eq!(
            body(r#"{"message":"Entry locked","error":"Conflict"}"#).reason(),
            Some("Entry locked")
        );
    }

    #[test]
    fn reason_falls_back_to_error() {
        assert_eq!(body(r#"{"error":"Unauthorized"}"#).reason(), Some("Unauthorized"));
        assert_eq!(
            body(r#"{"message":"","error":"Unauthorized"}"#).reason(),
            Some("Unauthorized")
        );
    }

    #[test]
    fn reason_ignores_non_strings() {
        assert_eq!(body(r#"{"message":{"code":7},"error":false}"#).reason(), None);
        assert_eq!(body("{}").reason(), None);
    }

    #[test]
    fn envelopes_tolerate_missing_payload() {
        let list: EntriesResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(list.entries.is_none());

        let single: EntryResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(single.entry.is_none());
    }
}
