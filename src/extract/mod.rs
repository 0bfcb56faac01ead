//! Request/reply channel to the page-extraction collaborator.
//!
//! Generic documents (plain PDFs with no bibliographic API) cannot be
//! resolved over HTTP alone; the process that can see the rendered page is
//! asked to extract title and authors instead. That collaborator lives on
//! the far side of an mpsc channel: the orchestrator sends an
//! [`ExtractionRequest`] carrying a oneshot reply slot and awaits the
//! answer under a single timeout. A slow or missing collaborator therefore
//! degrades into an ordinary [`ResolveError::Network`] and flows through
//! the normal retry path.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::metadata::PaperMetadata;
use crate::resolver::ResolveError;

/// Default wait for the collaborator to answer one extraction.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_millis(8000);

/// One extraction job handed to the collaborator.
///
/// The collaborator answers on `reply`; dropping the sender without
/// answering is reported to the requester as a network-class failure.
#[derive(Debug)]
pub struct ExtractionRequest {
    pub tab_id: u64,
    pub url: String,
    pub reply: oneshot::Sender<Result<PaperMetadata, ResolveError>>,
}

/// Requester-side handle for page extraction.
///
/// Cheap to clone; all clones feed the same collaborator queue.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    sender: mpsc::Sender<ExtractionRequest>,
    timeout: Duration,
}

impl ExtractionClient {
    /// Creates a client plus the receiver end the collaborator drains.
    #[must_use]
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<ExtractionRequest>) {
        let (sender, receiver) = mpsc::channel(32);
        (Self { sender, timeout }, receiver)
    }

    /// Asks the collaborator to extract metadata from the page in `tab_id`.
    ///
    /// One timeout covers the whole exchange: enqueueing, the collaborator's
    /// work, and the reply. Expiry and a closed channel both surface as
    /// [`ResolveError::Network`] so callers treat an absent collaborator
    /// like any other unreachable source.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] on timeout, a gone collaborator, or when the
    /// collaborator itself reports a failure.
    pub async fn request(
        &self,
        tab_id: u64,
        url: &str,
    ) -> Result<PaperMetadata, ResolveError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ExtractionRequest {
            tab_id,
            url: url.to_string(),
            reply: reply_tx,
        };

        debug!(tab_id, url, "dispatching page extraction request");

        let exchange = async {
            self.sender
                .send(request)
                .await
                .map_err(|_| ResolveError::network("extraction collaborator is gone"))?;
            reply_rx
                .await
                .map_err(|_| ResolveError::network("extraction collaborator dropped the request"))?
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tab_id,
                    timeout_ms = self.timeout.as_millis(),
                    "page extraction timed out"
                );
                Err(ResolveError::network("page extraction timed out"))
            }
        }
    }
}
