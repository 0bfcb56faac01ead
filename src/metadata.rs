//! Shared paper metadata model and tab-title formatting.

use serde::{Deserialize, Serialize};

use crate::classifier::PaperSource;

/// Placeholder title used when a source returns no usable title field.
pub const UNTITLED: &str = "Untitled";

/// Structured metadata for a single paper, produced by a resolver or by the
/// page-extraction collaborator. Treated as immutable once constructed; the
/// cache entry keyed by canonical URL is the owning copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    /// Source-local identifier (normalized, no version suffix for arXiv).
    pub id: String,
    /// Paper title.
    pub title: String,
    /// Ordered author names.
    pub authors: Vec<String>,
    /// Which source produced this metadata.
    pub source: PaperSource,
    /// Canonical URL for the paper (also the cache key).
    pub canonical_url: String,
    /// Publication timestamp as reported by the source (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Last-updated timestamp as reported by the source (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Venue or invitation string, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Publication year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Abstract text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
}

impl PaperMetadata {
    /// Creates metadata with the required fields; optional fields default to `None`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        authors: Vec<String>,
        source: PaperSource,
        canonical_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors,
            source,
            canonical_url: canonical_url.into(),
            published: None,
            updated: None,
            venue: None,
            year: None,
            abstract_text: None,
        }
    }
}

impl serde::Serialize for PaperSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for PaperSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "arxiv" => Ok(Self::Arxiv),
            "openreview" => Ok(Self::OpenReview),
            "generic" => Ok(Self::GenericDocument),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["arxiv", "openreview", "generic"],
            )),
        }
    }
}

/// Formats the display title applied to a tab.
///
/// Rule: `"{title} - {firstAuthor}"` with ` et al.` appended when more than
/// one author is present, or the bare title when no authors are known.
/// An empty title falls back to [`UNTITLED`].
#[must_use]
pub fn format_tab_title(metadata: &PaperMetadata) -> String {
    let title = if metadata.title.trim().is_empty() {
        UNTITLED
    } else {
        metadata.title.trim()
    };

    match metadata.authors.first() {
        Some(first) if metadata.authors.len() > 1 => format!("{title} - {first} et al."),
        Some(first) => format!("{title} - {first}"),
        None => title.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(authors: Vec<&str>) -> PaperMetadata {
        PaperMetadata::new(
            "2301.00001",
            "Attention Is All You Need",
            authors.into_iter().map(String::from).collect(),
            PaperSource::Arxiv,
            "https://arxiv.org/abs/2301.00001",
        )
    }

    #[test]
    fn test_format_title_single_author() {
        let metadata = sample(vec!["Ashish Vaswani"]);
        assert_eq!(
            format_tab_title(&metadata),
            "Attention Is All You Need - Ashish Vaswani"
        );
    }

    #[test]
    fn test_format_title_multiple_authors_uses_et_al() {
        let metadata = sample(vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(
            format_tab_title(&metadata),
            "Attention Is All You Need - Ashish Vaswani et al."
        );
    }

    #[test]
    fn test_format_title_no_authors_is_bare_title() {
        let metadata = sample(vec![]);
        assert_eq!(format_tab_title(&metadata), "Attention Is All You Need");
    }

    #[test]
    fn test_format_title_empty_title_falls_back_to_untitled() {
        let mut metadata = sample(vec!["A. Author"]);
        metadata.title = "   ".to_string();
        assert_eq!(format_tab_title(&metadata), "Untitled - A. Author");
    }

    #[test]
    fn test_paper_source_serde_round_trip() {
        for source in [
            PaperSource::Arxiv,
            PaperSource::OpenReview,
            PaperSource::GenericDocument,
        ] {
            let json = serde_json::to_string(&source).unwrap();
            let back: PaperSource = serde_json::from_str(&json).unwrap();
            assert_eq!(source, back);
        }
    }
}
