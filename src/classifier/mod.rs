//! URL classification for paper pages.
//!
//! Pure pattern matching that maps an observed tab URL to a paper identity:
//! which source it belongs to, the source-local identifier, and whether the
//! link points at the document file itself or at the abstract/forum page.
//! Rules are applied in a fixed order and the first match wins; URLs ending
//! in a document-file extension fall back to [`PaperSource::GenericDocument`].

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const ARXIV_HOST: &str = "arxiv.org";
const OPENREVIEW_HOST: &str = "openreview.net";

/// Valid arXiv identifier: new-format `YYMM.NNNNN` with optional version suffix.
#[allow(clippy::expect_used)]
static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{4}\.\d{4,5}(?:v\d+)?$").expect("arXiv id regex is valid") // Static pattern, safe to panic
});

/// Trailing version suffix (`v1`, `v2`, ...) on an arXiv identifier.
#[allow(clippy::expect_used)]
static VERSION_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)v\d+$").expect("version suffix regex is valid"));

/// OpenReview note identifiers are URL-safe word characters.
#[allow(clippy::expect_used)]
static OPENREVIEW_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("OpenReview id regex is valid"));

/// Which external source a classified URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperSource {
    /// arXiv abstract or PDF pages, resolved via the arXiv export API.
    Arxiv,
    /// OpenReview forum or PDF pages, resolved via the OpenReview notes API.
    OpenReview,
    /// Any other URL ending in a document-file extension; metadata comes
    /// from the page's own extraction collaborator.
    GenericDocument,
}

impl std::fmt::Display for PaperSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Arxiv => "arxiv",
            Self::OpenReview => "openreview",
            Self::GenericDocument => "generic",
        };
        write!(f, "{name}")
    }
}

/// A paper identity derived purely from a URL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIdentity {
    /// Source the URL belongs to.
    pub source: PaperSource,
    /// Source-local identifier (full URL for generic documents).
    pub id: String,
    /// True when the URL points at the document file rather than the
    /// abstract/forum landing page.
    pub is_direct_document: bool,
}

impl ParsedIdentity {
    /// Canonical URL for this identity, used as the single cache key
    /// regardless of which variant link was observed.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        match self.source {
            PaperSource::Arxiv => {
                format!("https://arxiv.org/abs/{}", normalize_id(&self.id))
            }
            PaperSource::OpenReview => {
                format!("https://openreview.net/forum?id={}", self.id)
            }
            PaperSource::GenericDocument => self.id.clone(),
        }
    }
}

/// Classifies a URL into a paper identity, or `None` for non-paper pages.
///
/// Deterministic and free of I/O; the same input always yields the same
/// output. Site-specific rules are tried first (direct-document link before
/// landing page, per source), then the generic document-extension fallback.
#[must_use]
pub fn classify(url: &str) -> Option<ParsedIdentity> {
    if let Ok(parsed) = Url::parse(url.trim()) {
        let host = parsed.host_str().map(str::to_ascii_lowercase);
        match host.as_deref() {
            Some(host) if host_matches(host, ARXIV_HOST) => {
                if let Some(identity) = classify_arxiv(&parsed) {
                    return Some(identity);
                }
            }
            Some(host) if host_matches(host, OPENREVIEW_HOST) => {
                if let Some(identity) = classify_openreview(&parsed) {
                    return Some(identity);
                }
            }
            _ => {}
        }
    }

    // Fallback: any URL ending in a document-file extension is treated as a
    // generic document keyed by its own URL.
    if url.trim().to_ascii_lowercase().ends_with(".pdf") {
        return Some(ParsedIdentity {
            source: PaperSource::GenericDocument,
            id: url.trim().to_string(),
            is_direct_document: true,
        });
    }

    None
}

/// Returns true if the URL classifies as a paper page.
#[must_use]
pub fn is_paper_url(url: &str) -> bool {
    classify(url).is_some()
}

/// Strips a trailing version suffix (`v1`, `v2`, ...) so all versions of one
/// identifier collapse to a single cache/resolver identity.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    VERSION_SUFFIX_RE.replace(id.trim(), "").into_owned()
}

fn host_matches(host: &str, expected: &str) -> bool {
    host == expected || host.strip_suffix(expected).is_some_and(|p| p.ends_with('.'))
}

fn classify_arxiv(url: &Url) -> Option<ParsedIdentity> {
    let path = url.path();

    if let Some(id) = path.strip_prefix("/pdf/") {
        let id = id.strip_suffix(".pdf").unwrap_or(id);
        if ARXIV_ID_RE.is_match(id) {
            return Some(ParsedIdentity {
                source: PaperSource::Arxiv,
                id: id.to_string(),
                is_direct_document: true,
            });
        }
    }

    if let Some(id) = path.strip_prefix("/abs/") {
        if ARXIV_ID_RE.is_match(id) {
            return Some(ParsedIdentity {
                source: PaperSource::Arxiv,
                id: id.to_string(),
                is_direct_document: false,
            });
        }
    }

    None
}

fn classify_openreview(url: &Url) -> Option<ParsedIdentity> {
    let is_direct = match url.path() {
        "/pdf" => true,
        "/forum" => false,
        _ => return None,
    };

    let id = url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())?;

    if OPENREVIEW_ID_RE.is_match(&id) {
        Some(ParsedIdentity {
            source: PaperSource::OpenReview,
            id,
            is_direct_document: is_direct,
        })
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_arxiv_abstract() {
        let identity = classify("https://arxiv.org/abs/2301.00001").unwrap();
        assert_eq!(identity.source, PaperSource::Arxiv);
        assert_eq!(identity.id, "2301.00001");
        assert!(!identity.is_direct_document);
    }

    #[test]
    fn test_classify_arxiv_pdf() {
        let identity = classify("https://arxiv.org/pdf/2301.00001.pdf").unwrap();
        assert_eq!(identity.source, PaperSource::Arxiv);
        assert_eq!(identity.id, "2301.00001");
        assert!(identity.is_direct_document);
    }

    #[test]
    fn test_classify_arxiv_pdf_without_extension() {
        let identity = classify("https://arxiv.org/pdf/2301.00001").unwrap();
        assert_eq!(identity.source, PaperSource::Arxiv);
        assert!(identity.is_direct_document);
    }

    #[test]
    fn test_classify_arxiv_versioned_id() {
        let identity = classify("https://arxiv.org/abs/2301.00001v3").unwrap();
        assert_eq!(identity.id, "2301.00001v3");
    }

    #[test]
    fn test_classify_openreview_forum() {
        let identity = classify("https://openreview.net/forum?id=aBcD1234").unwrap();
        assert_eq!(identity.source, PaperSource::OpenReview);
        assert_eq!(identity.id, "aBcD1234");
        assert!(!identity.is_direct_document);
    }

    #[test]
    fn test_classify_openreview_pdf() {
        let identity = classify("https://openreview.net/pdf?id=aBcD1234").unwrap();
        assert_eq!(identity.source, PaperSource::OpenReview);
        assert!(identity.is_direct_document);
    }

    #[test]
    fn test_classify_generic_pdf() {
        let identity = classify("https://example.com/papers/report.pdf").unwrap();
        assert_eq!(identity.source, PaperSource::GenericDocument);
        assert_eq!(identity.id, "https://example.com/papers/report.pdf");
        assert!(identity.is_direct_document);
    }

    #[test]
    fn test_classify_non_paper_url_returns_none() {
        assert!(classify("https://example.com/about").is_none());
        assert!(classify("https://arxiv.org/list/cs.LG/recent").is_none());
        assert!(classify("not a url").is_none());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let url = "https://arxiv.org/abs/2301.00001";
        let first = classify(url);
        let second = classify(url);
        assert_eq!(first, second);
    }

    #[test]
    fn test_is_paper_url() {
        assert!(is_paper_url("https://arxiv.org/abs/2301.00001"));
        assert!(is_paper_url("https://example.com/x.pdf"));
        assert!(!is_paper_url("https://example.com/x.html"));
    }

    #[test]
    fn test_normalize_id_strips_version_suffix() {
        assert_eq!(normalize_id("2301.00001v2"), "2301.00001");
        assert_eq!(normalize_id("2301.00001"), "2301.00001");
        assert_eq!(normalize_id("2301.00001v12"), "2301.00001");
    }

    #[test]
    fn test_canonical_url_collapses_link_variants() {
        let abs = classify("https://arxiv.org/abs/2301.00001").unwrap();
        let pdf = classify("https://arxiv.org/pdf/2301.00001.pdf").unwrap();
        let versioned = classify("https://arxiv.org/pdf/2301.00001v2.pdf").unwrap();
        assert_eq!(abs.canonical_url(), "https://arxiv.org/abs/2301.00001");
        assert_eq!(abs.canonical_url(), pdf.canonical_url());
        assert_eq!(abs.canonical_url(), versioned.canonical_url());
    }

    #[test]
    fn test_canonical_url_openreview_and_generic() {
        let forum = classify("https://openreview.net/pdf?id=xYz9").unwrap();
        assert_eq!(
            forum.canonical_url(),
            "https://openreview.net/forum?id=xYz9"
        );
        let generic = classify("https://example.com/a.pdf").unwrap();
        assert_eq!(generic.canonical_url(), "https://example.com/a.pdf");
    }
}
