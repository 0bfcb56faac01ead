//! Papertab Core Library
//!
//! This library provides the metadata resolution and caching pipeline behind
//! the papertab tool, which retitles browser tabs displaying academic papers
//! using metadata resolved from bibliographic APIs or scraped page metadata.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`classifier`] - URL pattern classification into paper identities
//! - [`metadata`] - Shared paper metadata model and title formatting
//! - [`cache`] - Bounded, time-expiring metadata cache with LRU batch eviction
//! - [`resolver`] - Source-specific async metadata resolvers
//! - [`extract`] - Request/reply channel to the page-extraction collaborator
//! - [`tabs`] - Per-tab lifecycle state tracking
//! - [`orchestrator`] - Central resolution coordinator with retry/backoff

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod classifier;
pub mod extract;
pub mod metadata;
pub mod orchestrator;
pub mod resolver;
pub mod tabs;

mod user_agent;

// Re-export commonly used types
pub use cache::{CacheConfig, MetadataCache, SweeperHandle};
pub use classifier::{PaperSource, ParsedIdentity, classify, is_paper_url, normalize_id};
pub use extract::{ExtractionClient, ExtractionRequest};
pub use metadata::{PaperMetadata, format_tab_title};
pub use orchestrator::{Orchestrator, PageStatus, StatusSnapshot, TabEvent, TitleApplyError, TitleSink};
pub use resolver::{MetadataResolver, ResolveError, ResolverSet};
pub use tabs::{TabState, TabStateManager, TabStatus, TabUpdate};
