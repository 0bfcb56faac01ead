//! OpenReview metadata resolver backed by the notes API.
//!
//! Calls `GET {base}/notes?id={id}` and normalizes the JSON note into
//! [`PaperMetadata`]. The notes API is loosely typed: depending on venue and
//! API generation, `title`, `authors`, `abstract`, and `venue` arrive either
//! as plain values or as objects carrying the real value under a `value` (or
//! `name`/`text`) key. A small set of untagged serde shapes normalizes both
//! forms at the boundary so no variance leaks into core logic.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::classifier::PaperSource;
use crate::metadata::{PaperMetadata, UNTITLED};

use super::gate::parse_retry_after;
use super::http_client::build_resolver_http_client;
use super::{MetadataResolver, ResolveError};

/// Default OpenReview API base URL.
const DEFAULT_BASE_URL: &str = "https://api2.openreview.net";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Fallback wait hint when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(3000);

// ==================== OpenReview API Response Types ====================

#[derive(Debug, Deserialize)]
struct NotesResponse {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct Note {
    id: String,
    #[serde(default)]
    content: NoteContent,
    /// Invitation string, used as the venue fallback.
    #[serde(default)]
    invitation: Option<String>,
    /// Creation time in epoch seconds.
    #[serde(default)]
    cdate: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NoteContent {
    title: Option<FlexField>,
    authors: Option<AuthorsField>,
    #[serde(rename = "abstract")]
    abstract_text: Option<FlexField>,
    venue: Option<FlexField>,
}

/// A field that is either a plain string or an object wrapping the value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexField {
    Plain(String),
    Nested {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

impl FlexField {
    /// Unwraps to the carried string, probing alternate keys in order.
    fn into_string(self) -> Option<String> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Nested { value, name, text } => value.or(name).or(text),
        }
    }
}

/// Authors arrive either as a list of flexible entries or wrapped once more
/// under a `value` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorsField {
    List(Vec<FlexField>),
    Nested { value: Vec<FlexField> },
}

impl AuthorsField {
    fn into_names(self) -> Vec<String> {
        let entries = match self {
            Self::List(entries) | Self::Nested { value: entries } => entries,
        };
        entries
            .into_iter()
            .filter_map(FlexField::into_string)
            .collect()
    }
}

// ==================== OpenReviewResolver ====================

/// Resolves OpenReview note identifiers via the notes API.
pub struct OpenReviewResolver {
    client: Client,
    base_url: String,
}

impl OpenReviewResolver {
    /// Creates a resolver against the public notes API.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if HTTP client construction fails.
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        Self::build(DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Creates a resolver with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if HTTP client construction fails.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        Self::build(base_url.into(), timeout)
    }

    fn build(base_url: String, timeout: Duration) -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client("openreview", timeout)?,
            base_url,
        })
    }
}

impl std::fmt::Debug for OpenReviewResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenReviewResolver")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataResolver for OpenReviewResolver {
    fn name(&self) -> &str {
        "openreview"
    }

    fn source(&self) -> PaperSource {
        PaperSource::OpenReview
    }

    #[tracing::instrument(skip(self), fields(resolver = "openreview", id = %id))]
    async fn resolve(&self, id: &str) -> Result<PaperMetadata, ResolveError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ResolveError::invalid_input(
                "OpenReview identifier is empty",
            ));
        }

        let url = format!("{}/notes?id={}", self.base_url, urlencoding::encode(id));
        debug!(api_url = %url, "calling OpenReview notes API");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ResolveError::network("OpenReview API request timed out")
                } else {
                    ResolveError::network(format!("OpenReview API request failed: {error}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            warn!(
                retry_after_ms = retry_after.as_millis(),
                "OpenReview rate limit hit"
            );
            return Err(ResolveError::rate_limited(
                "OpenReview API rate limit exceeded",
                retry_after,
            ));
        }
        if status.as_u16() == 404 {
            return Err(ResolveError::not_found(format!(
                "OpenReview has no record for '{id}'"
            )));
        }
        if !status.is_success() {
            return Err(ResolveError::network(format!(
                "OpenReview API returned status {status}"
            )));
        }

        let body = response
            .json::<NotesResponse>()
            .await
            .map_err(|error| {
                ResolveError::parse(format!("unexpected OpenReview response format: {error}"))
            })?;

        let Some(note) = body.notes.into_iter().next() else {
            return Err(ResolveError::not_found(format!(
                "paper '{id}' not found in OpenReview"
            )));
        };

        Ok(note_to_metadata(note))
    }
}

/// Normalizes one note into the canonical metadata shape.
fn note_to_metadata(note: Note) -> PaperMetadata {
    let title = note
        .content
        .title
        .and_then(FlexField::into_string)
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let authors = note
        .content
        .authors
        .map(AuthorsField::into_names)
        .unwrap_or_default();

    let venue = note
        .content
        .venue
        .and_then(FlexField::into_string)
        .or(note.invitation);

    let year = note
        .cdate
        .and_then(|seconds| chrono::DateTime::from_timestamp(seconds, 0))
        .map(|datetime| datetime.year());

    let canonical_url = format!("https://openreview.net/forum?id={}", note.id);
    let mut metadata = PaperMetadata::new(
        note.id,
        title,
        authors,
        PaperSource::OpenReview,
        canonical_url,
    );
    metadata.venue = venue;
    metadata.year = year;
    metadata.abstract_text = note.content.abstract_text.and_then(FlexField::into_string);
    metadata
}
