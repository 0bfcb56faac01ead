//! Source-specific metadata resolvers.
//!
//! A resolver turns a source-local paper identifier into [`PaperMetadata`]
//! via a remote API call. Every resolver follows one contract: the call is
//! bounded by a timeout, never panics on malformed responses, and reports
//! every failure as a typed [`ResolveError`] the orchestrator can act on.
//!
//! # Architecture
//!
//! - [`MetadataResolver`] - Async trait that individual resolvers implement
//! - [`ResolverSet`] - Source-keyed collection with dispatch by [`PaperSource`]
//! - [`ArxivResolver`] - arXiv export API (Atom), gated by a shared
//!   minimum-inter-request interval
//! - [`OpenReviewResolver`] - OpenReview notes API (JSON)
//! - [`gate`] - Shared rate gate and Retry-After parsing

pub mod arxiv;
pub mod gate;
mod http_client;
pub mod openreview;

pub use arxiv::ArxivResolver;
pub use gate::{RequestGate, parse_retry_after};
pub use http_client::build_resolver_http_client;
pub use openreview::OpenReviewResolver;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::classifier::PaperSource;
use crate::metadata::PaperMetadata;

/// Errors returned by metadata resolution.
///
/// Resolvers never propagate transport or parsing problems as panics or
/// opaque errors; each failure maps to exactly one of these kinds so the
/// orchestrator's retry policy can distinguish recoverable failures
/// (rate-limited, network, parse) from terminal ones (not-found, invalid
/// input).
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The source rejected the call with HTTP 429.
    #[error("rate limited: {message} (retry after {retry_after:?})")]
    RateLimited {
        /// Human-readable description of the rejection.
        message: String,
        /// Server-provided or default wait hint.
        retry_after: Duration,
    },

    /// The source has no record for this identifier.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description.
        message: String,
    },

    /// Transport failure: timeout, connection error, or non-2xx status.
    #[error("network error: {message}")]
    Network {
        /// Human-readable description.
        message: String,
    },

    /// The response arrived but its body could not be interpreted.
    #[error("parse error: {message}")]
    Parse {
        /// Human-readable description.
        message: String,
    },

    /// The identifier itself is malformed; no call was attempted.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable description.
        message: String,
    },
}

impl ResolveError {
    /// Creates a `RateLimited` error with a wait hint.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the orchestrator's backoff policy may retry this failure.
    ///
    /// Not-found and invalid-input are terminal: retrying cannot change the
    /// outcome.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network { .. } | Self::Parse { .. }
        )
    }

    /// Short kind label for logging and status reporting.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound { .. } => "not_found",
            Self::Network { .. } => "network",
            Self::Parse { .. } => "parse",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }
}

/// Trait that all metadata resolvers implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn MetadataResolver>`. Rust 2024 native async traits are not
/// object-safe, so `async_trait` is required for the [`ResolverSet`] pattern.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Returns the resolver's name (e.g. "arxiv", "openreview").
    fn name(&self) -> &str;

    /// Which source this resolver handles.
    fn source(&self) -> PaperSource;

    /// Resolves an identifier into paper metadata.
    ///
    /// At most one network call is in flight per invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] classifying the failure; never panics on
    /// remote misbehavior.
    async fn resolve(&self, id: &str) -> Result<PaperMetadata, ResolveError>;
}

/// Source-keyed collection of resolvers.
///
/// Dispatch is by [`PaperSource`]: exactly one resolver handles each API
/// source. Generic documents are not resolved here; they go through the
/// page-extraction collaborator.
#[derive(Default)]
pub struct ResolverSet {
    resolvers: Vec<Box<dyn MetadataResolver>>,
}

impl ResolverSet {
    /// Creates an empty resolver set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver. A later registration for the same source
    /// shadows an earlier one.
    pub fn register(&mut self, resolver: Box<dyn MetadataResolver>) {
        debug!(
            name = resolver.name(),
            source = %resolver.source(),
            "registering resolver"
        );
        self.resolvers.push(resolver);
    }

    /// Returns the number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Finds the resolver handling `source`, preferring the most recent
    /// registration.
    #[must_use]
    pub fn for_source(&self, source: PaperSource) -> Option<&dyn MetadataResolver> {
        self.resolvers
            .iter()
            .rev()
            .find(|resolver| resolver.source() == source)
            .map(AsRef::as_ref)
    }

    /// Resolves `id` through the resolver registered for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidInput`] when no resolver is registered
    /// for the source, or the resolver's own error otherwise.
    pub async fn resolve(
        &self,
        source: PaperSource,
        id: &str,
    ) -> Result<PaperMetadata, ResolveError> {
        let Some(resolver) = self.for_source(source) else {
            return Err(ResolveError::invalid_input(format!(
                "no resolver registered for source '{source}'"
            )));
        };
        debug!(resolver = resolver.name(), id, "dispatching to resolver");
        resolver.resolve(id).await
    }
}

/// Builds the default resolver set used by runtime flows.
///
/// # Errors
///
/// Returns [`ResolveError`] when HTTP client construction fails.
pub fn build_default_resolver_set(
    arxiv_interval: Duration,
    timeout: Duration,
) -> Result<ResolverSet, ResolveError> {
    let mut set = ResolverSet::new();
    set.register(Box::new(ArxivResolver::new(arxiv_interval, timeout)?));
    set.register(Box::new(OpenReviewResolver::new(timeout)?));
    Ok(set)
}
