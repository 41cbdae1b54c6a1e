//! Lodestone Entra - token-based connection authentication
//!
//! Lets a Postgres connection pool authenticate with short-lived Entra
//! (Azure AD) bearer tokens instead of a static password: a credential
//! produces tokens, a refresher caches the current one, and a connection
//! builder wires the refresher in as the pool's password source.

pub mod builder;
pub mod credential;
pub mod provider;

pub use builder::ConnectionBuilder;
pub use credential::{AccessToken, ClientSecretCredential, StaticTokenCredential, TokenCredential};
pub use provider::EntraTokenProvider;

use std::time::Duration;

/// OAuth scope for Azure Database for PostgreSQL
pub const ENTRA_DB_SCOPE: &str = "https://ossrdbms-aad.database.windows.net/.default";

/// A cached token closer than this to expiry is refreshed
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// How long a pooled physical connection lives before it is recycled with
/// fresh credentials
pub const PASSWORD_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout for a single identity-provider call
pub const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(10);
