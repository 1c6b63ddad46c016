//! Per-process coordination of the shared recording operation.
//!
//! Every cooperating process runs one [`Coordinator`]. It owns this process's
//! view of the shared record and is the only code that writes it.
//!
//! # Architecture
//!
//! ```text
//! CoordinatorHandle ──┐
//! wake callback ──────┼──▶ CoordinatorEvent (mpsc) ──▶ Coordinator::run()
//! upload task ────────┤                                   │
//! reset timer ────────┘                                   ├─ StateStore::load / save
//!                                                         ├─ WakeChannel::post
//!                                                         ├─ Recorder start / stop
//!                                                         └─ watch::Sender<OperationState> ──▶ UI
//! ```
//!
//! Events are handled strictly one at a time, so transitions issued by one
//! process are totally ordered. The upload runs as a separate task and
//! re-enters the loop through [`CoordinatorEvent::UploadFinished`].
//!
//! # Reconciliation
//!
//! On every wake signal and every activation the coordinator reloads the
//! shared record and compares it with the last record it wrote or adopted:
//!
//! | shared                  | this process               | action                         |
//! |-------------------------|----------------------------|--------------------------------|
//! | stale, not our own live | any                        | write `idle`                   |
//! | unchanged               | any                        | nothing                        |
//! | `stopping`              | owner, `recording`         | finalize capture, upload       |
//! | anything else           | owner                      | abandon local capture          |
//! | `recording`             | capture-capable            | start capture                  |
//! | `stopping`              | capture-capable, not owner | `error` (no audio)             |
//! | `done`                  | has a transcript sink      | deliver text, write `idle`     |
//! | anything else           |                            | adopt                          |
//!
//! Wake signals are only hints; correctness relies on reconciling at every
//! activation as well.

pub mod deep_link;
pub mod handle;
pub mod runner;
pub mod view;

use std::time::Duration;

use crate::config::SyncConfig;
use crate::state::{OperationState, Staleness};
use crate::upload::UploadError;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use deep_link::{DeepLink, DeepLinkError, URL_SCHEME};
pub use handle::CoordinatorHandle;
pub use runner::{CaptureBackend, Coordinator, TranscriptSink};
pub use view::ViewModel;

/// Error text stored when capture could not start.
pub fn capture_failed_message(reason: &str) -> String {
    format!("Failed to start recording: {reason}")
}

/// Error text stored when stopping yielded no audio.
pub const NO_AUDIO_MESSAGE: &str = "No audio recorded";

/// Error text stored when the upload failed.
pub fn upload_failed_message(error: &UploadError) -> String {
    format!("Transcription failed: {error}")
}

// ---------------------------------------------------------------------------
// CoordinatorEvent
// ---------------------------------------------------------------------------

/// Everything the coordinator loop reacts to.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// Local user intent (button, CLI, deep link).
    StartRequested,
    StopRequested,
    /// A wake signal arrived from another process.
    Wake,
    /// The process became active (foregrounded, view appeared, poll tick).
    Activated,
    /// The upload for owned operation `operation` completed.
    UploadFinished {
        operation: u64,
        result: Result<String, UploadError>,
    },
    /// The auto-reset delay scheduled as `generation` elapsed.
    ResetDue { generation: u64 },
    /// Reply with the current local record once earlier events are handled.
    Snapshot(tokio::sync::oneshot::Sender<OperationState>),
    Shutdown,
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub staleness: Staleness,
    /// Delay before `done` / `error` returns to `idle`.
    pub reset_after: Duration,
    /// Periodic self-activation; `None` relies on wake signals and explicit
    /// activation only.
    pub activation_poll: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for Timing {
    fn from(sync: &SyncConfig) -> Self {
        Self {
            staleness: sync.staleness(),
            reset_after: sync.reset_after(),
            activation_poll: sync.activation_poll(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_sync_defaults() {
        let timing = Timing::default();
        assert_eq!(timing.staleness.recording, Duration::from_secs(30));
        assert_eq!(timing.staleness.busy, Duration::from_secs(90));
        assert_eq!(timing.reset_after, Duration::from_secs(3));
        assert_eq!(timing.activation_poll, Some(Duration::from_secs(2)));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            capture_failed_message("no input device"),
            "Failed to start recording: no input device"
        );
        assert_eq!(
            upload_failed_message(&UploadError::ServerError("quota".into())),
            "Transcription failed: Server error: quota"
        );
    }
}
