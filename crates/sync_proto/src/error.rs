//! Error taxonomy for the synchronizer core.
//!
//! Per-path failures (a single `stat`/`read`/`readlink` call) never produce a
//! [`SyncError`] - they collapse to `Option::None` signatures (§4.1 of the
//! design). Only batch-level and transport-level failures are represented
//! here, matching the error-handling policy: per-path errors never abort a
//! pass, batch-level errors re-queue the batch, transport errors are fatal.

use thiserror::Error;

/// Errors the sync orchestrator reacts to at the pass or transport level.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Raised while computing signatures for a candidate batch. Recoverable:
    /// the orchestrator logs, re-enqueues the original batch, and returns to
    /// idle.
    #[error("signature scan failed: {0}")]
    ScanFailure(#[source] std::io::Error),

    /// Raised while streaming changed blocks to the remote. Recoverable,
    /// same policy as [`SyncError::ScanFailure`].
    #[error("content stream failed: {0}")]
    StreamFailure(#[source] std::io::Error),

    /// A framing error, unexpected EOF, or a remote-reported failure on the
    /// RPC channel. Fatal: the orchestrator stops the loop and propagates.
    #[error("rpc channel failure: {0}")]
    Rpc(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The orchestrator was asked to shut down while a blocking operation
    /// was in flight. Not a failure - unwound cleanly, never re-enqueued.
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl SyncError {
    /// `true` for errors that should re-enqueue the current batch and
    /// continue the sync loop; `false` for errors that stop it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::ScanFailure(_) | SyncError::StreamFailure(_))
    }
}

/// Per-path signature lookups never produce a [`SyncError`]; this alias
/// documents that `None` is the expected "absent or unreadable" outcome.
pub type PathResult<T> = Option<T>;
