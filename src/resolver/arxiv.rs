//! arXiv metadata resolver backed by the export API.
//!
//! Calls `GET {base}/api/query?id_list={id}` and parses the Atom response
//! into [`PaperMetadata`]. The export API asks clients to keep roughly three
//! seconds between requests, so every call is routed through one shared
//! [`RequestGate`].
//!
//! The Atom body is small and rigidly shaped, so it is parsed with
//! lightweight tag extraction rather than a full XML parser.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::classifier::{PaperSource, normalize_id};
use crate::metadata::PaperMetadata;

use super::gate::{RequestGate, parse_retry_after};
use super::http_client::build_resolver_http_client;
use super::{MetadataResolver, ResolveError};

/// Default arXiv export API base URL.
const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

/// Minimum spacing between export API requests asked for by arXiv.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(3000);

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Fallback wait hint when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(3000);

#[allow(clippy::expect_used)]
static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{4}\.\d{4,5}(?:v\d+)?$").expect("arXiv id regex is valid") // Static pattern, safe to panic
});

/// Resolves arXiv identifiers via the export API.
pub struct ArxivResolver {
    client: Client,
    base_url: String,
    gate: Arc<RequestGate>,
}

impl ArxivResolver {
    /// Creates a resolver against the public export API.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if HTTP client construction fails.
    pub fn new(min_interval: Duration, timeout: Duration) -> Result<Self, ResolveError> {
        Self::build(DEFAULT_BASE_URL.to_string(), min_interval, timeout)
    }

    /// Creates a resolver with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if HTTP client construction fails.
    pub fn with_base_url(
        base_url: impl Into<String>,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        Self::build(base_url.into(), min_interval, timeout)
    }

    fn build(
        base_url: String,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client("arxiv", timeout)?,
            base_url,
            gate: Arc::new(RequestGate::new(min_interval)),
        })
    }

    /// The shared rate gate all calls on this resolver pass through.
    #[must_use]
    pub fn gate(&self) -> Arc<RequestGate> {
        Arc::clone(&self.gate)
    }
}

impl std::fmt::Debug for ArxivResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArxivResolver")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataResolver for ArxivResolver {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn source(&self) -> PaperSource {
        PaperSource::Arxiv
    }

    #[tracing::instrument(skip(self), fields(resolver = "arxiv", id = %id))]
    async fn resolve(&self, id: &str) -> Result<PaperMetadata, ResolveError> {
        let normalized = normalize_id(id);
        if !ARXIV_ID_RE.is_match(&normalized) {
            return Err(ResolveError::invalid_input(format!(
                "'{id}' is not a valid arXiv identifier"
            )));
        }

        self.gate.acquire().await;

        let url = format!(
            "{}/api/query?id_list={}",
            self.base_url,
            urlencoding::encode(&normalized)
        );
        debug!(api_url = %url, "calling arXiv export API");

        let response = self.client.get(&url).send().await.map_err(|error| {
            if error.is_timeout() {
                ResolveError::network("arXiv API request timed out")
            } else {
                ResolveError::network(format!("arXiv API request failed: {error}"))
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
            warn!(retry_after_ms = retry_after.as_millis(), "arXiv rate limit hit");
            return Err(ResolveError::rate_limited(
                "arXiv API rate limit exceeded",
                retry_after,
            ));
        }
        if status.as_u16() == 404 {
            return Err(ResolveError::not_found(format!(
                "arXiv has no record for '{normalized}'"
            )));
        }
        if !status.is_success() {
            return Err(ResolveError::network(format!(
                "arXiv API returned status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| ResolveError::network(format!("failed reading response body: {error}")))?;

        parse_atom_entry(&body, &normalized)
    }
}

// ==================== Atom Parsing ====================

/// Parses the first `<entry>` of an arXiv Atom feed into metadata.
///
/// # Errors
///
/// Returns [`ResolveError::Parse`] when the feed has no entry or lacks the
/// required title field.
fn parse_atom_entry(xml: &str, requested_id: &str) -> Result<PaperMetadata, ResolveError> {
    let entry = extract_block(xml, "entry")
        .ok_or_else(|| ResolveError::parse("arXiv response contained no feed entry"))?;

    let id = extract_tag_text(entry, "id")
        .as_deref()
        .and_then(|url| url.rsplit_once("/abs/").map(|(_, id)| normalize_id(id)))
        .unwrap_or_else(|| requested_id.to_string());

    let title = extract_tag_text(entry, "title")
        .map(|raw| normalize_whitespace(&raw))
        .filter(|title| !title.is_empty())
        .ok_or_else(|| ResolveError::parse("arXiv entry is missing a title"))?;

    let mut authors = Vec::new();
    let mut search_from = 0;
    while let Some(pos) = entry[search_from..].find("<author>") {
        let start = search_from + pos + "<author>".len();
        let Some(end) = entry[start..].find("</author>") else {
            break;
        };
        if let Some(name) = extract_tag_text(&entry[start..start + end], "name") {
            authors.push(normalize_whitespace(&name));
        }
        search_from = start + end + "</author>".len();
    }

    let published = extract_tag_text(entry, "published");
    let year = published
        .as_deref()
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse::<i32>().ok());

    let mut metadata = PaperMetadata::new(
        id.clone(),
        title,
        authors,
        PaperSource::Arxiv,
        format!("https://arxiv.org/abs/{id}"),
    );
    metadata.published = published;
    metadata.updated = extract_tag_text(entry, "updated");
    metadata.year = year;
    metadata.abstract_text =
        extract_tag_text(entry, "summary").map(|raw| normalize_whitespace(&raw));

    Ok(metadata)
}

/// Extracts the inner content of the first `<tag>...</tag>` block.
fn extract_block<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

/// Extracts the text content of the first `<tag ...>text</tag>` occurrence,
/// with standard XML entities unescaped.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let start_pos = xml.find(&open)?;
    // The opening tag may carry attributes.
    let content_start = xml[start_pos..].find('>')? + start_pos + 1;
    let content_end = xml[content_start..].find(&close)? + content_start;

    Some(unescape_xml(xml[content_start..content_end].trim()))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapses runs of whitespace (arXiv wraps titles and abstracts).
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
