use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::decode::Payload;

/// The claims BecomeLog cares about, each optional.
///
/// Identity claims that are present but not strings read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, deserialize_with = "lenient::string")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_id: Option<String>,
    #[serde(rename = "userId", default, deserialize_with = "lenient::string")]
    pub user_id_camel: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub username: Option<String>,
    #[serde(rename = "cognito:username", default, deserialize_with = "lenient::string")]
    pub cognito_username: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    /// Expiry, seconds since the epoch.
    #[serde(default, deserialize_with = "lenient::numeric_date")]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn from_payload(payload: &Payload) -> Self {
        serde_json::from_value(Value::Object(payload.clone())).unwrap_or_default()
    }

    /// `sub`, `user_id`, `userId`, then `id`; `""` when none is set.
    pub fn user_id(&self) -> &str {
        first_non_empty([&self.sub, &self.user_id, &self.user_id_camel, &self.id]).unwrap_or("")
    }

    pub fn email(&self) -> Option<&str> {
        first_non_empty([&self.email])
    }

    pub fn username(&self) -> Option<&str> {
        first_non_empty([&self.username, &self.cognito_username, &self.name])
    }

    /// `None` without an `exp` claim, otherwise whether it lies before `now_secs`.
    pub fn is_expired_at(&self, now_secs: i64) -> Option<bool> {
        self.exp.map(|exp| exp < now_secs)
    }
}

fn first_non_empty<const N: usize>(fields: [&Option<String>; N]) -> Option<&str> {
    fields
        .into_iter()
        .filter_map(|field| field.as_deref())
        .find(|value| !value.is_empty())
}

/// Identity summary of a token, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_expired: Option<bool>,
    pub payload: Payload,
}

mod lenient {
    use super::*;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|secs| secs.floor() as i64)),
            _ => None,
        })
    }
}
