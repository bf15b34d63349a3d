use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

use crate::claims::{Claims, UserInfo};

/// Raw claims of a token payload.
pub type Payload = Map<String, Value>;

/// Standard alphabet, padding optional, non-zero trailing bits accepted.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the payload segment of `token`.
///
/// Returns `None` unless the token has exactly three `.`-separated segments
/// and the middle one is base64url (or standard base64) encoded JSON object.
pub fn decode_jwt(token: &str) -> Option<Payload> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = LENIENT.decode(to_standard_alphabet(payload)).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Map base64url onto the standard alphabet.
fn to_standard_alphabet(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect()
}

/// A decoded payload together with its typed claims.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    payload: Payload,
    claims: Claims,
}

impl DecodedToken {
    pub fn parse(token: &str) -> Option<Self> {
        decode_jwt(token).map(Self::from_payload)
    }

    pub fn from_payload(payload: Payload) -> Self {
        let claims = Claims::from_payload(&payload);
        Self { payload, claims }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Identity summary, judging expiry against `now_secs`.
    pub fn user_info_at(self, now_secs: i64) -> UserInfo {
        let claims = &self.claims;
        UserInfo {
            user_id: claims.user_id().to_string(),
            email: claims.email().map(str::to_string),
            username: claims.username().map(str::to_string),
            is_expired: claims.is_expired_at(now_secs),
            payload: self.payload,
        }
    }
}
