use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use becomelog_types::api::{EntriesResponse, EntryResponse, ErrorBody, HealthStatus};
use becomelog_types::entry::{Entry, EntryPatch, NewEntry};

use crate::auth::AuthSession;
use crate::error::ApiError;

/// Page size used when the caller has no preference.
pub const DEFAULT_ENTRY_LIMIT: u32 = 50;

/// Client for the BecomeLog REST API.
///
/// Every entry call reads the base URL and the session's current token first
/// and fails before touching the network when either is missing.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    api_url: Option<String>,
    session: AuthSession,
}

impl ApiClient {
    pub fn new(api_url: Option<String>, session: AuthSession) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.map(|url| url.trim_end_matches('/').to_string()),
            session,
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|url| !url.is_empty())
    }

    /// GET /api/entries?limit=N
    pub async fn list_entries(&self, limit: u32) -> Result<Vec<Entry>, ApiError> {
        let mut url = self.endpoint(&["api", "entries"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());

        let response: EntriesResponse = self.request(Method::GET, url, None::<&()>).await?;
        response
            .entries
            .ok_or(ApiError::MissingPayload("Entries missing from response"))
    }

    /// GET /api/entries/{id}
    pub async fn get_entry(&self, entry_id: &str) -> Result<Entry, ApiError> {
        let url = self.endpoint(&["api", "entries", entry_id])?;
        let response: EntryResponse = self.request(Method::GET, url, None::<&()>).await?;
        response
            .entry
            .ok_or(ApiError::MissingPayload("Entry not found"))
    }

    /// POST /api/entries
    pub async fn create_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
        let url = self.endpoint(&["api", "entries"])?;
        let response: EntryResponse = self.request(Method::POST, url, Some(entry)).await?;
        response
            .entry
            .ok_or(ApiError::MissingPayload("Failed to create entry"))
    }

    /// PUT /api/entries/{id}. Only the fields set on `patch` change.
    pub async fn update_entry(&self, entry_id: &str, patch: &EntryPatch) -> Result<Entry, ApiError> {
        let url = self.endpoint(&["api", "entries", entry_id])?;
        let response: EntryResponse = self.request(Method::PUT, url, Some(patch)).await?;
        response
            .entry
            .ok_or(ApiError::MissingPayload("Failed to update entry"))
    }

    /// DELETE /api/entries/{id}. The response body is not inspected.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "entries", entry_id])?;
        self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(())
    }

    /// GET /health, without credentials.
    pub async fn check_health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.endpoint(&["health"])?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("Health check failed ({})", status);
            return Err(ApiError::HealthCheck(status.as_u16()));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let base = self.api_url().ok_or(ApiError::MissingApiUrl)?;
        let invalid = || ApiError::InvalidApiUrl(base.to_string());

        let mut url = Url::parse(base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let resp = self.send(method, url, body).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send an authenticated request and turn non-2xx responses into errors.
    async fn send<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.session.token().ok_or(ApiError::MissingToken)?;
        debug!("{} {}", method, url);

        let path = url.path().to_string();
        let mut req = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        // Error bodies are best effort: unreadable or non-JSON bodies fall
        // back to the status line.
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        warn!("{} {} failed ({}): {}", method, path, status, message);
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}
