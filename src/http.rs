//! Shared HTTP client configuration with sensible defaults.

use crate::error::{LektError, Result};
use std::time::Duration;

/// Default `llm.timeout_seconds` (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connect timeout; a provider that cannot accept a connection in this time is down.
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Create an HTTP client with a custom overall request timeout.
///
/// Streaming responses are bounded by the same timeout, so it should be long
/// enough for a full answer to be generated.
pub fn create_client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("lekt/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LektError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))
}
