//! Resolution orchestrator tying the pipeline together.
//!
//! The orchestrator receives tab lifecycle events, decides whether a tab
//! shows a paper, and drives the whole resolution flow for it: cache lookup
//! by canonical URL, dispatch to a source resolver or the page-extraction
//! collaborator, write-through caching, title application, and retry
//! scheduling on failure. Every attempt runs in its own spawned task, so one
//! slow or failing tab never blocks another.
//!
//! Supersession is generation-based: each navigation bumps the tab's
//! generation counter, and an attempt (or pending retry) started under an
//! older generation discards its result when it finds it is stale.
//!
//! Retry policy is asymmetric on purpose. Metadata resolution backs off
//! exponentially (1 s, 2 s, 4 s; at most three retries, rate-limit hints
//! honored when longer) and only for retryable failure kinds. Title
//! application retries independently at a fixed 1 s spacing and its
//! exhaustion never re-triggers resolution, since the metadata is already
//! resolved and cached.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::MetadataCache;
use crate::classifier::{ParsedIdentity, PaperSource, classify};
use crate::extract::ExtractionClient;
use crate::metadata::{PaperMetadata, format_tab_title};
use crate::resolver::{ResolveError, ResolverSet};
use crate::tabs::{TabState, TabStateManager, TabStatus, TabUpdate};

/// Maximum number of resolution retries after the initial attempt.
const MAX_RESOLVE_RETRIES: u32 = 3;

/// Base delay for exponential resolution backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Number of title application attempts per resolved paper.
const TITLE_APPLY_ATTEMPTS: u32 = 3;

/// Fixed spacing between title application attempts.
const TITLE_APPLY_SPACING: Duration = Duration::from_millis(1000);

/// Failure reported by a [`TitleSink`].
#[derive(Debug, Clone, Error)]
#[error("title apply failed: {message}")]
pub struct TitleApplyError {
    message: String,
}

impl TitleApplyError {
    /// Creates an error with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Side-effect boundary for setting a tab's displayed title.
///
/// The production implementation talks to the browser; tests and the CLI
/// substitute their own.
#[async_trait]
pub trait TitleSink: Send + Sync {
    /// Applies `title` to the tab.
    ///
    /// # Errors
    ///
    /// Returns [`TitleApplyError`] when the title could not be applied;
    /// the orchestrator retries on its own schedule.
    async fn apply_title(&self, tab_id: u64, title: &str) -> Result<(), TitleApplyError>;
}

/// Page load phase reported by a tab event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Navigation started; the page is not yet readable.
    Loading,
    /// The page finished loading.
    Complete,
}

/// A tab lifecycle notification fed into the orchestrator.
#[derive(Debug, Clone)]
pub struct TabEvent {
    pub tab_id: u64,
    pub url: String,
    pub status: PageStatus,
}

/// Point-in-time pipeline summary for display surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Whether the orchestrator is accepting resolution work.
    pub is_active: bool,
    /// Most recent failure description, if any.
    pub last_error: Option<String>,
    /// Papers successfully resolved and retitled since start or last
    /// cache clear.
    pub resolved_count: u64,
    /// Current number of cached metadata entries.
    pub cache_size: usize,
}

struct OrchestratorInner {
    cache: MetadataCache,
    resolvers: ResolverSet,
    extraction: ExtractionClient,
    tabs: TabStateManager,
    sink: Arc<dyn TitleSink>,
    active: AtomicBool,
    resolved_count: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Drives tab events through classification, resolution, caching, and
/// title application. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        cache: MetadataCache,
        resolvers: ResolverSet,
        extraction: ExtractionClient,
        sink: Arc<dyn TitleSink>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                cache,
                resolvers,
                extraction,
                tabs: TabStateManager::new(),
                sink,
                active: AtomicBool::new(true),
                resolved_count: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Enables or disables resolution. While inactive, tab events are
    /// tracked but no resolution work starts.
    pub fn set_active(&self, active: bool) {
        self.inner.active.store(active, Ordering::SeqCst);
        info!(active, "orchestrator activity changed");
    }

    /// Feeds one tab lifecycle event into the pipeline.
    ///
    /// Loading events reset the tab's retry budget and supersede any
    /// in-flight attempt; complete events on paper URLs start a resolution
    /// attempt in a background task.
    #[instrument(skip(self), fields(tab_id = event.tab_id, status = ?event.status))]
    pub fn handle_tab_event(&self, event: TabEvent) {
        let TabEvent {
            tab_id,
            url,
            status,
        } = event;

        match status {
            PageStatus::Loading => {
                // A new navigation invalidates whatever was in flight.
                self.inner.tabs.begin_generation(tab_id);
                self.inner.tabs.update_tab(
                    tab_id,
                    TabUpdate {
                        url: Some(url),
                        status: Some(TabStatus::Loading),
                        retry_count: Some(0),
                        ..TabUpdate::default()
                    },
                );
            }
            PageStatus::Complete => {
                self.inner.tabs.update_tab(
                    tab_id,
                    TabUpdate {
                        url: Some(url.clone()),
                        ..TabUpdate::default()
                    },
                );

                if !self.inner.active.load(Ordering::SeqCst) {
                    debug!(tab_id, "inactive - skipping resolution");
                    return;
                }
                let Some(identity) = classify(&url) else {
                    debug!(tab_id, url, "not a paper URL");
                    return;
                };

                let generation = self.inner.tabs.begin_generation(tab_id);
                tokio::spawn(OrchestratorInner::attempt(
                    Arc::clone(&self.inner),
                    tab_id,
                    url,
                    identity,
                    generation,
                ));
            }
        }
    }

    /// Drops all state for a closed tab and cancels its pending retry.
    pub fn tab_closed(&self, tab_id: u64) {
        debug!(tab_id, "tab closed");
        self.inner.tabs.delete_tab(tab_id);
    }

    /// Returns the tracked state for a tab, if any.
    #[must_use]
    pub fn tab_state(&self, tab_id: u64) -> Option<TabState> {
        self.inner.tabs.get_tab(tab_id)
    }

    /// Produces a point-in-time pipeline summary.
    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_active: self.inner.active.load(Ordering::SeqCst),
            last_error: self.inner.last_error_slot().clone(),
            resolved_count: self.inner.resolved_count.load(Ordering::SeqCst),
            cache_size: self.inner.cache.len().await,
        }
    }

    /// Empties the metadata cache and zeroes the resolution stats.
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
        self.inner.resolved_count.store(0, Ordering::SeqCst);
        *self.inner.last_error_slot() = None;
        info!("cache cleared and stats reset");
    }
}

impl OrchestratorInner {
    fn last_error_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_error(&self, description: String) {
        warn!(error = %description, "recording pipeline failure");
        *self.last_error_slot() = Some(description);
    }

    /// One resolution attempt for one tab, running in its own task.
    #[instrument(skip(inner, identity), fields(source = %identity.source))]
    async fn attempt(
        inner: Arc<Self>,
        tab_id: u64,
        url: String,
        identity: ParsedIdentity,
        generation: u64,
    ) {
        let canonical = identity.canonical_url();

        if let Some(metadata) = inner.cache.get(&canonical).await {
            debug!(tab_id, key = canonical, "cache hit");
            inner
                .finish_success(tab_id, generation, metadata, false)
                .await;
            return;
        }

        let result = match identity.source {
            PaperSource::GenericDocument => inner.extraction.request(tab_id, &url).await,
            source => inner.resolvers.resolve(source, &identity.id).await,
        };

        if !inner.tabs.is_current_generation(tab_id, generation) {
            debug!(tab_id, generation, "attempt superseded - dropping result");
            return;
        }

        match result {
            Ok(metadata) => {
                inner.cache.set(&canonical, metadata.clone()).await;
                inner
                    .finish_success(tab_id, generation, metadata, true)
                    .await;
            }
            Err(error) => {
                inner
                    .handle_failure(tab_id, url, identity, generation, &error)
                    .await;
            }
        }
    }

    /// Marks the tab complete, applies the title, and bumps the counter.
    async fn finish_success(
        self: &Arc<Self>,
        tab_id: u64,
        generation: u64,
        metadata: PaperMetadata,
        freshly_resolved: bool,
    ) {
        if !self.tabs.is_current_generation(tab_id, generation) {
            debug!(tab_id, "success superseded - dropping result");
            return;
        }

        let title = format_tab_title(&metadata);
        self.tabs.update_tab(
            tab_id,
            TabUpdate {
                status: Some(TabStatus::Complete),
                metadata: Some(metadata),
                retry_count: Some(0),
                ..TabUpdate::default()
            },
        );
        self.resolved_count.fetch_add(1, Ordering::SeqCst);
        info!(tab_id, title, freshly_resolved, "paper resolved");

        self.apply_title_with_retries(tab_id, &title).await;
    }

    /// Applies the title, retrying on a fixed schedule. Exhaustion records
    /// the failure but the resolution itself stays complete.
    async fn apply_title_with_retries(&self, tab_id: u64, title: &str) {
        for attempt_number in 1..=TITLE_APPLY_ATTEMPTS {
            match self.sink.apply_title(tab_id, title).await {
                Ok(()) => return,
                Err(error) if attempt_number < TITLE_APPLY_ATTEMPTS => {
                    warn!(tab_id, attempt_number, %error, "title apply failed, retrying");
                    tokio::time::sleep(TITLE_APPLY_SPACING).await;
                }
                Err(error) => {
                    self.record_error(format!("title apply exhausted for tab {tab_id}: {error}"));
                }
            }
        }
    }

    /// Records a failed attempt and schedules a retry when policy allows.
    async fn handle_failure(
        self: &Arc<Self>,
        tab_id: u64,
        url: String,
        identity: ParsedIdentity,
        generation: u64,
        error: &ResolveError,
    ) {
        let failures_before = self
            .tabs
            .get_tab(tab_id)
            .map_or(0, |state| state.retry_count);
        let failures = failures_before + 1;

        self.tabs.update_tab(
            tab_id,
            TabUpdate {
                status: Some(TabStatus::Error),
                retry_count: Some(failures),
                ..TabUpdate::default()
            },
        );
        self.record_error(format!(
            "resolution failed for tab {tab_id} ({}): {error}",
            error.kind()
        ));

        if !error.is_retryable() {
            debug!(tab_id, kind = error.kind(), "failure is terminal");
            return;
        }
        if failures_before >= MAX_RESOLVE_RETRIES {
            warn!(tab_id, failures, "retry budget exhausted");
            return;
        }

        // 1 s, 2 s, 4 s; a longer server wait hint wins over the backoff.
        let mut delay = RETRY_BASE_DELAY * 2u32.pow(failures_before);
        if let ResolveError::RateLimited { retry_after, .. } = error {
            delay = delay.max(*retry_after);
        }
        debug!(tab_id, delay_ms = delay.as_millis(), "scheduling retry");

        let retry = Self::attempt_boxed(Arc::clone(self), tab_id, url, identity, generation);
        let tabs = self.tabs.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tabs.is_current_generation(tab_id, generation) {
                retry.await;
            }
        });
        self.tabs.set_retry_timer(tab_id, handle);
    }

    /// Type-erased [`Self::attempt`], so a retry can re-enter the attempt
    /// without a recursive future type.
    fn attempt_boxed(
        inner: Arc<Self>,
        tab_id: u64,
        url: String,
        identity: ParsedIdentity,
        generation: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(Self::attempt(inner, tab_id, url, identity, generation))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::extract::ExtractionClient;
    use crate::metadata::PaperMetadata;
    use crate::resolver::MetadataResolver;
    use std::sync::atomic::AtomicU32;

    // ==================== Test Doubles ====================

    /// Records applied titles; optionally fails the first N applications.
    #[derive(Default)]
    struct RecordingSink {
        titles: Mutex<Vec<(u64, String)>>,
        failures_remaining: AtomicU32,
    }

    impl RecordingSink {
        fn failing_first(n: u32) -> Self {
            Self {
                titles: Mutex::new(Vec::new()),
                failures_remaining: AtomicU32::new(n),
            }
        }

        fn applied(&self) -> Vec<(u64, String)> {
            self.titles.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TitleSink for RecordingSink {
        async fn apply_title(&self, tab_id: u64, title: &str) -> Result<(), TitleApplyError> {
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TitleApplyError::new("sink unavailable"));
            }
            self.titles.lock().unwrap().push((tab_id, title.to_string()));
            Ok(())
        }
    }

    /// Fails a configurable number of times before succeeding.
    struct FlakyResolver {
        source: PaperSource,
        calls: Arc<AtomicU32>,
        failures: u32,
        error: ResolveError,
    }

    #[async_trait]
    impl MetadataResolver for FlakyResolver {
        fn name(&self) -> &str {
            "flaky"
        }

        fn source(&self) -> PaperSource {
            self.source
        }

        async fn resolve(&self, id: &str) -> Result<PaperMetadata, ResolveError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(PaperMetadata::new(
                id,
                "Attention Is All You Need",
                vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()],
                self.source,
                format!("https://arxiv.org/abs/{id}"),
            ))
        }
    }

    fn build(
        failures: u32,
        error: ResolveError,
        sink: Arc<RecordingSink>,
    ) -> (Orchestrator, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let mut resolvers = ResolverSet::new();
        resolvers.register(Box::new(FlakyResolver {
            source: PaperSource::Arxiv,
            calls: Arc::clone(&calls),
            failures,
            error,
        }));
        let (extraction, _receiver) = ExtractionClient::new(Duration::from_secs(1));
        let orchestrator = Orchestrator::new(
            MetadataCache::new(CacheConfig::default()),
            resolvers,
            extraction,
            sink,
        );
        (orchestrator, calls)
    }

    fn complete_event(tab_id: u64, url: &str) -> TabEvent {
        TabEvent {
            tab_id,
            url: url.to_string(),
            status: PageStatus::Complete,
        }
    }

    /// Lets spawned attempts run to their next await under a paused clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    const ABS_URL: &str = "https://arxiv.org/abs/1706.03762";

    // ==================== Happy Path ====================

    #[tokio::test]
    async fn test_complete_event_resolves_and_applies_title() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(0, ResolveError::network("x"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            sink.applied(),
            vec![(1, "Attention Is All You Need - Ashish Vaswani et al.".to_string())]
        );
        let state = orchestrator.tab_state(1).unwrap();
        assert_eq!(state.status, TabStatus::Complete);
        assert_eq!(state.retry_count, 0);

        let status = orchestrator.status().await;
        assert_eq!(status.resolved_count, 1);
        assert_eq!(status.cache_size, 1);
    }

    #[tokio::test]
    async fn test_second_tab_same_paper_hits_cache() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(0, ResolveError::network("x"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        // A different link variant of the same paper, in another tab.
        orchestrator.handle_tab_event(complete_event(2, "https://arxiv.org/pdf/1706.03762v2"));
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1, "second tab must be a cache hit");
        assert_eq!(sink.applied().len(), 2);
        assert_eq!(orchestrator.status().await.resolved_count, 2);
    }

    #[tokio::test]
    async fn test_non_paper_url_is_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(0, ResolveError::network("x"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, "https://example.com/blog"));
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.applied().is_empty());
    }

    // ==================== Retry Policy ====================

    #[tokio::test]
    async fn test_retryable_failure_follows_backoff_schedule() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(u32::MAX, ResolveError::network("down"), sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 1 s backoff before the first retry.
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // 2 s before the second.
        tokio::time::advance(Duration::from_millis(2100)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // 4 s before the third and last.
        tokio::time::advance(Duration::from_millis(4100)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // Budget exhausted: no further calls no matter how long we wait.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let state = orchestrator.tab_state(1).unwrap();
        assert_eq!(state.status, TabStatus::Error);
        assert_eq!(state.retry_count, 4);
        assert!(orchestrator.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn test_rate_limit_hint_extends_backoff() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let error = ResolveError::rate_limited("slow down", Duration::from_millis(5000));
        let (orchestrator, calls) = build(1, error, sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The 1 s backoff is overridden by the 5 s server hint.
        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "must wait out the server hint");

        tokio::time::advance(Duration::from_millis(3500)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            orchestrator.tab_state(1).unwrap().status,
            TabStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(u32::MAX, ResolveError::not_found("gone"), sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.tab_state(1).unwrap().status, TabStatus::Error);
    }

    #[tokio::test]
    async fn test_recovery_on_second_attempt() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(1, ResolveError::network("blip"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.applied().len(), 1);
        assert_eq!(
            orchestrator.tab_state(1).unwrap().status,
            TabStatus::Complete
        );
    }

    // ==================== Supersession and Close ====================

    #[tokio::test]
    async fn test_new_navigation_cancels_pending_retry() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(u32::MAX, ResolveError::network("down"), sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Navigate away while a retry is pending; the retry must die with
        // the old generation.
        orchestrator.handle_tab_event(TabEvent {
            tab_id: 1,
            url: "https://example.com/elsewhere".to_string(),
            status: PageStatus::Loading,
        });
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.tab_state(1).unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn test_tab_close_cancels_retry_and_drops_state() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(u32::MAX, ResolveError::network("down"), sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        orchestrator.tab_closed(1);

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(orchestrator.tab_state(1).is_none());
    }

    #[tokio::test]
    async fn test_one_tab_failure_does_not_affect_another() {
        let sink = Arc::new(RecordingSink::default());
        let calls = Arc::new(AtomicU32::new(0));
        let mut resolvers = ResolverSet::new();
        resolvers.register(Box::new(FlakyResolver {
            source: PaperSource::Arxiv,
            calls: Arc::clone(&calls),
            failures: 0,
            error: ResolveError::network("x"),
        }));
        let (extraction, _receiver) = ExtractionClient::new(Duration::from_secs(1));
        let orchestrator = Orchestrator::new(
            MetadataCache::new(CacheConfig::default()),
            resolvers,
            extraction,
            Arc::clone(&sink) as Arc<dyn TitleSink>,
        );

        // Tab 1 fails (OpenReview has no registered resolver here, which is
        // a terminal invalid-input failure); tab 2 resolves normally.
        orchestrator.handle_tab_event(complete_event(
            1,
            "https://openreview.net/forum?id=abc123",
        ));
        orchestrator.handle_tab_event(complete_event(2, ABS_URL));
        settle().await;

        assert_eq!(orchestrator.tab_state(1).unwrap().status, TabStatus::Error);
        assert_eq!(
            orchestrator.tab_state(2).unwrap().status,
            TabStatus::Complete
        );
        assert_eq!(sink.applied().len(), 1);
    }

    // ==================== Title Apply Policy ====================

    #[tokio::test]
    async fn test_title_apply_retries_on_fixed_schedule() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::failing_first(2));
        let (orchestrator, _calls) = build(0, ResolveError::network("x"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert!(sink.applied().is_empty());

        // Two fixed 1 s waits, then the third attempt lands.
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;

        assert_eq!(sink.applied().len(), 1);
        // Resolution itself stayed complete throughout.
        assert_eq!(
            orchestrator.tab_state(1).unwrap().status,
            TabStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_title_apply_exhaustion_records_error_only() {
        tokio::time::pause();
        let sink = Arc::new(RecordingSink::failing_first(u32::MAX));
        let (orchestrator, calls) = build(0, ResolveError::network("x"), Arc::clone(&sink));

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        settle().await;

        assert!(sink.applied().is_empty());
        let status = orchestrator.status().await;
        assert!(status.last_error.unwrap().contains("title apply"));
        // Exhaustion never re-triggers metadata resolution.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(status.resolved_count, 1);
    }

    // ==================== Status and Cache Control ====================

    #[tokio::test]
    async fn test_clear_cache_resets_stats() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(0, ResolveError::network("x"), sink);

        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(orchestrator.status().await.resolved_count, 1);

        orchestrator.clear_cache().await;
        let status = orchestrator.status().await;
        assert_eq!(status.resolved_count, 0);
        assert_eq!(status.cache_size, 0);
        assert!(status.last_error.is_none());

        // Next visit resolves again instead of hitting the cache.
        orchestrator.handle_tab_event(complete_event(2, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inactive_orchestrator_skips_resolution() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, calls) = build(0, ResolveError::network("x"), sink);

        orchestrator.set_active(false);
        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!orchestrator.status().await.is_active);

        orchestrator.set_active(true);
        orchestrator.handle_tab_event(complete_event(1, ABS_URL));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_snapshot_serializes() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, _calls) = build(0, ResolveError::network("x"), sink);

        let json = serde_json::to_value(orchestrator.status().await).unwrap();
        assert_eq!(json["is_active"], true);
        assert_eq!(json["resolved_count"], 0);
    }
}
