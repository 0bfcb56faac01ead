//! Shared HTTP client construction policy for resolvers.
//!
//! Centralizes resolver networking defaults so site resolvers stay
//! consistent on timeout, user-agent, and compression.

use std::time::Duration;

use reqwest::Client;

use crate::user_agent;

use super::ResolveError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Builds a resolver HTTP client using shared project policy.
///
/// `timeout` bounds the whole request; exceeding it surfaces as a reqwest
/// timeout error which resolvers map to [`ResolveError::Network`].
/// `resolver_name` is used only for error messages, not in the User-Agent
/// header (single shared UA; no per-resolver fingerprinting).
///
/// # Errors
///
/// Returns [`ResolveError`] when client construction fails.
pub fn build_resolver_http_client(
    resolver_name: &str,
    timeout: Duration,
) -> Result<Client, ResolveError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .user_agent(user_agent::default_resolver_user_agent())
        .gzip(true)
        .build()
        .map_err(|error| {
            ResolveError::network(format!(
                "HTTP client construction failed for {resolver_name}: {error}"
            ))
        })
}
