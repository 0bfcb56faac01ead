//! Per-tab resolution state tracking.
//!
//! Each browser tab the orchestrator has seen gets a [`TabState`] row in a
//! concurrent map: what URL it shows, where resolution stands, and how many
//! attempts have failed. The manager also owns two per-tab control pieces
//! the orchestrator leans on for cancellation:
//!
//! - a generation counter, bumped on every new navigation, so an in-flight
//!   resolution can detect it has been superseded and drop its result;
//! - the `JoinHandle` of any pending retry timer, aborted when the tab
//!   navigates again or closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::metadata::PaperMetadata;

/// Where resolution currently stands for one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    /// Page still loading, or resolution in flight.
    Loading,
    /// Metadata resolved and applied.
    Complete,
    /// Last attempt failed; `retry_count` says how many times.
    Error,
}

/// Tracked state for one tab.
#[derive(Debug, Clone)]
pub struct TabState {
    pub tab_id: u64,
    pub url: String,
    pub status: TabStatus,
    pub metadata: Option<PaperMetadata>,
    pub last_update: Instant,
    pub retry_count: u32,
}

impl TabState {
    fn new(tab_id: u64) -> Self {
        Self {
            tab_id,
            url: String::new(),
            status: TabStatus::Loading,
            metadata: None,
            last_update: Instant::now(),
            retry_count: 0,
        }
    }
}

/// Partial update merged into a tab's state.
///
/// `None` fields leave the existing value untouched; `last_update` is
/// refreshed on every merge.
#[derive(Debug, Default)]
pub struct TabUpdate {
    pub url: Option<String>,
    pub status: Option<TabStatus>,
    pub metadata: Option<PaperMetadata>,
    pub retry_count: Option<u32>,
}

#[derive(Debug, Default)]
struct TabControl {
    /// Bumped on each new navigation; stale attempts compare and bail.
    generation: AtomicU64,
    /// Pending retry timer, if any.
    retry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl TabControl {
    /// Locks the retry-timer slot, recovering from poisoning: a panic while
    /// swapping a `JoinHandle` leaves the handle itself valid to take or
    /// replace.
    fn timer_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.retry_timer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Concurrent registry of tab states and their cancellation controls.
///
/// Cheap to clone; all clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct TabStateManager {
    states: Arc<DashMap<u64, TabState>>,
    controls: Arc<DashMap<u64, Arc<TabControl>>>,
}

impl TabStateManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a partial update into the tab's state, creating the row if
    /// this is the first time the tab is seen.
    pub fn update_tab(&self, tab_id: u64, update: TabUpdate) {
        let mut entry = self
            .states
            .entry(tab_id)
            .or_insert_with(|| TabState::new(tab_id));

        if let Some(url) = update.url {
            entry.url = url;
        }
        if let Some(status) = update.status {
            entry.status = status;
        }
        if let Some(metadata) = update.metadata {
            entry.metadata = Some(metadata);
        }
        if let Some(retry_count) = update.retry_count {
            entry.retry_count = retry_count;
        }
        entry.last_update = Instant::now();
    }

    /// Returns a snapshot of the tab's state, if tracked.
    #[must_use]
    pub fn get_tab(&self, tab_id: u64) -> Option<TabState> {
        self.states.get(&tab_id).map(|entry| entry.clone())
    }

    /// Drops all state for a closed tab, aborting any pending retry.
    pub fn delete_tab(&self, tab_id: u64) {
        self.cancel_retry(tab_id);
        self.controls.remove(&tab_id);
        if self.states.remove(&tab_id).is_some() {
            debug!(tab_id, "dropped tab state");
        }
    }

    /// Number of tabs currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    // ==================== Cancellation Controls ====================

    /// Starts a new resolution generation for the tab and returns its token.
    ///
    /// Any pending retry from the previous generation is aborted; attempts
    /// spawned under an older token will see [`Self::is_current_generation`]
    /// fail and must discard their result.
    pub fn begin_generation(&self, tab_id: u64) -> u64 {
        self.cancel_retry(tab_id);
        let control = self.control(tab_id);
        let generation = control.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(tab_id, generation, "new resolution generation");
        generation
    }

    /// True when `generation` is still the tab's latest.
    #[must_use]
    pub fn is_current_generation(&self, tab_id: u64, generation: u64) -> bool {
        self.controls
            .get(&tab_id)
            .is_some_and(|control| control.generation.load(Ordering::SeqCst) == generation)
    }

    /// Records the tab's pending retry timer, aborting any previous one.
    pub fn set_retry_timer(&self, tab_id: u64, handle: JoinHandle<()>) {
        let control = self.control(tab_id);
        if let Some(previous) = control.timer_slot().replace(handle) {
            previous.abort();
        }
    }

    /// Aborts the tab's pending retry timer, if any.
    pub fn cancel_retry(&self, tab_id: u64) {
        if let Some(control) = self.controls.get(&tab_id)
            && let Some(handle) = control.timer_slot().take()
        {
            debug!(tab_id, "cancelled pending retry");
            handle.abort();
        }
    }

    fn control(&self, tab_id: u64) -> Arc<TabControl> {
        self.controls
            .entry(tab_id)
            .or_insert_with(|| Arc::new(TabControl::default()))
            .clone()
    }
}
