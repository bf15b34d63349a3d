use thiserror::Error;

/// Everything an [`ApiClient`](crate::ApiClient) call can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API URL not configured")]
    MissingApiUrl,

    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(String),

    #[error("No authentication token available")]
    MissingToken,

    /// Non-2xx response. `message` comes from the body when it has one.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// 2xx response without the expected payload key.
    #[error("{0}")]
    MissingPayload(&'static str),

    #[error("Health check failed: {0}")]
    HealthCheck(u16),

    #[error("Invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::HealthCheck(status) => Some(*status),
            _ => None,
        }
    }
}
