//! Shared User-Agent string for resolver HTTP clients.
//!
//! Single source for project URL and UA format so resolver traffic stays
//! consistent and easy to update (good citizenship; RFC 9308).

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/papertab/papertab";

/// Default User-Agent for resolver requests (single shared format; no per-resolver name in header).
#[must_use]
pub(crate) fn default_resolver_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("papertab/{version} (research-tool; +{PROJECT_UA_URL})")
}
