use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authenticated,
    Unauthenticated,
    InvalidToken,
    Loading,
}

/// Snapshot of an auth session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub token: Option<String>,
    pub status: AuthStatus,
    /// Origin of an embedding host page. Never set by the standalone session.
    pub parent_origin: Option<String>,
}

impl AuthState {
    /// Holds `token`; the status follows from whether one is present.
    pub fn with_token(token: Option<String>) -> Self {
        let status = if token.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        };
        Self {
            token,
            status,
            parent_origin: None,
        }
    }

    pub fn signed_out() -> Self {
        Self::with_token(None)
    }
}
