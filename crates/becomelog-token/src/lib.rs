/// JWT payload decoding for display purposes.
///
/// Nothing here verifies a signature or enforces expiry: the decoder only
/// reads what a token claims about its holder. Malformed input never errors,
/// it decodes to `None`.

pub mod claims;
pub mod decode;

pub use claims::{Claims, UserInfo};
pub use decode::{DecodedToken, Payload, decode_jwt};

/// Current UTC time in whole seconds since the epoch.
fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// User id claim of `token`, or `""` when the token cannot be decoded.
pub fn user_id_from_token(token: &str) -> String {
    DecodedToken::parse(token)
        .map(|decoded| decoded.claims().user_id().to_string())
        .unwrap_or_default()
}

pub fn email_from_token(token: &str) -> Option<String> {
    DecodedToken::parse(token).and_then(|decoded| decoded.claims().email().map(str::to_string))
}

pub fn username_from_token(token: &str) -> Option<String> {
    DecodedToken::parse(token)
        .and_then(|decoded| decoded.claims().username().map(str::to_string))
}

/// `Some(true)` once `exp` has passed, `Some(false)` before that, and `None`
/// when the token has no `exp` claim or cannot be decoded.
pub fn is_token_expired(token: &str) -> Option<bool> {
    DecodedToken::parse(token).and_then(|decoded| decoded.claims().is_expired_at(now_secs()))
}

pub fn user_info_from_token(token: &str) -> Option<UserInfo> {
    DecodedToken::parse(token).map(|decoded| decoded.user_info_at(now_secs()))
}
