//! Shared minimum-inter-request gate and Retry-After parsing.
//!
//! Some sources (notably the arXiv export API) ask clients to keep a fixed
//! minimum spacing between requests. The [`RequestGate`] serializes every
//! outbound call through one shared last-dispatch timestamp: before a call,
//! the caller sleeps for whatever remains of the interval, then records a new
//! dispatch time. The timestamp lock is held across the sleep, so no two
//! concurrent dispatches can both pass the check before either updates it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Shared rate gate enforcing a minimum interval between dispatches.
///
/// Designed to be wrapped in `Arc` and shared by every clone of a resolver,
/// so all calls to one source observe a single global spacing.
#[derive(Debug)]
pub struct RequestGate {
    min_interval: Duration,
    /// `None` until the first dispatch; the first call proceeds immediately.
    last_dispatch: Mutex<Option<Instant>>,
}

impl RequestGate {
    /// Creates a gate with the given minimum spacing between dispatches.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Returns the configured minimum interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the minimum interval since the last dispatch has elapsed,
    /// then records the new dispatch time.
    ///
    /// The internal lock is held for the duration of any sleep; concurrent
    /// callers queue and each observes the spacing.
    #[instrument(skip(self), fields(interval_ms = self.min_interval.as_millis()))]
    pub async fn acquire(&self) {
        let mut last_dispatch = self.last_dispatch.lock().await;

        if let Some(last) = *last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval.saturating_sub(elapsed);
                debug!(wait_ms = wait.as_millis(), "gating request");
                tokio::time::sleep(wait).await;
            }
        } else {
            debug!("first dispatch through gate - no delay");
        }

        // Update after sleeping, before the caller issues its request.
        *last_dispatch = Some(Instant::now());
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// The bibliographic APIs this tool talks to send the value as integer
/// **milliseconds** rather than the RFC 7231 seconds form, so integers are
/// read as milliseconds. HTTP-date values are also accepted and converted to
/// the remaining wait. Values are capped at 1 hour; unparseable or negative
/// values yield `None` and the caller applies its source default.
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(millis) = header_value.parse::<i64>() {
        if millis < 0 {
            debug!(millis, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_millis(millis as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                millis,
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        return match datetime.duration_since(now) {
            Ok(duration) if duration > MAX_RETRY_AFTER => {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                Some(MAX_RETRY_AFTER)
            }
            Ok(duration) => Some(duration),
            // Date is in the past
            Err(_) => Some(Duration::ZERO),
        };
    }

    debug!(header_value, "unparseable Retry-After value");
    None
}
