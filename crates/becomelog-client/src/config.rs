use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const API_URL_VAR: &str = "BECOMELOG_API_URL";
pub const DEV_AUTH_TOKEN_VAR: &str = "BECOMELOG_DEV_AUTH_TOKEN";
pub const CONFIG_PATH_VAR: &str = "BECOMELOG_CONFIG";

/// Deployment configuration, written as JSON at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub api_url: String,
    pub cognito_user_pool_id: String,
    pub cognito_client_id: String,
    pub region: String,
    pub stripe_publishable_key: String,
    pub stripe_prices: StripePrices,
}

/// Opaque price identifiers handed through to the billing UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripePrices {
    pub monthly: String,
    pub yearly: String,
    pub lifetime: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            cognito_user_pool_id: String::new(),
            cognito_client_id: String::new(),
            region: "us-east-1".into(),
            stripe_publishable_key: String::new(),
            stripe_prices: StripePrices::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid config JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Cannot load config {}", path.display()))
    }
}

/// Process environment lookup, for use with the resolvers below.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// API base URL: the config's `apiUrl` when set, else `BECOMELOG_API_URL`.
/// A trailing `/` is dropped.
pub fn resolve_api_url<E>(config: Option<&AppConfig>, env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    config
        .map(|c| c.api_url.clone())
        .and_then(non_empty)
        .or_else(|| env(API_URL_VAR).and_then(non_empty))
        .and_then(normalize_url)
}

/// Like [`resolve_api_url`], but an explicit `url_override` wins when it is
/// not blank.
pub fn resolve_api_url_with_override<E>(
    url_override: Option<&str>,
    config: Option<&AppConfig>,
    env: E,
) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    url_override
        .map(str::to_string)
        .and_then(normalize_url)
        .or_else(|| resolve_api_url(config, env))
}

fn normalize_url(url: String) -> Option<String> {
    non_empty(url.trim().trim_end_matches('/').to_string())
}

/// Token to fall back on when nothing is persisted.
pub fn dev_auth_token<E>(env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    env(DEV_AUTH_TOKEN_VAR).and_then(non_empty)
}

pub fn config_path<E>(env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    env(CONFIG_PATH_VAR).and_then(non_empty)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
