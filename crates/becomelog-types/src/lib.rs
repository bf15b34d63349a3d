/// Wire types shared by the BecomeLog client crates.
///
/// Field names follow the REST API's camelCase JSON. Server-assigned fields
/// only ever appear on [`entry::Entry`]; the request payloads cannot carry them.

pub mod api;
pub mod auth;
pub mod entry;

pub use api::{EntriesResponse, EntryResponse, ErrorBody, HealthStatus};
pub use auth::{AuthState, AuthStatus};
pub use entry::{Entry, EntryPatch, NewEntry};
