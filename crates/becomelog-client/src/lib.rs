/// BecomeLog API client
///
/// Resolves where the API lives, keeps the bearer token for the local user,
/// and performs entry CRUD over HTTP.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use api::{ApiClient, DEFAULT_ENTRY_LIMIT};
pub use auth::{AuthSession, DEFAULT_DEV_TOKEN, Subscription};
pub use config::{AppConfig, StripePrices};
pub use error::ApiError;
pub use store::{AUTH_TOKEN_KEY, FileTokenStore, MemoryTokenStore, TokenStore};
