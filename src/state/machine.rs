//! Transition table for the shared operation.
//!
//! ```text
//!             start                 stop                finalized
//!   Idle ───────────▶ Recording ──────────▶ Stopping ─────────────▶ Uploading
//!    ▲                   │  │                  │                      │    │
//!    │  stale            │  │ capture failed   │ no audio      failed │    │ ok
//!    ├───────────────────┘  ▼                  ▼                      ▼    ▼
//!    │                    Error ◀──────────────┴──────────────────── Error Done
//!    │    auto reset        │                                              │
//!    └──────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! `Done` / `Error` accept a fresh start (it supersedes the pending reset),
//! and `Done` can also be consumed straight back to `Idle` by the process
//! that inserts the transcript.

use super::record::OperationStatus;

/// Everything that can move the shared record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartRequested,
    StopRequested,
    CaptureFinalized,
    CaptureFailed,
    NoAudio,
    UploadSucceeded,
    UploadFailed,
    AutoReset,
    Consumed,
    Stale,
}

impl OperationStatus {
    /// Status reached by applying `event`, or `None` when the event is not
    /// valid from this status.
    pub fn next(self, event: Event) -> Option<OperationStatus> {
        use Event::*;
        use OperationStatus::*;

        match (self, event) {
            (Idle | Done | Error, StartRequested) => Some(Recording),
            (Recording, StopRequested) => Some(Stopping),
            (Stopping, CaptureFinalized) => Some(Uploading),
            (Uploading, UploadSucceeded) => Some(Done),
            (Uploading, UploadFailed) => Some(Error),
            (Idle | Recording | Done | Error, CaptureFailed) => Some(Error),
            (Stopping, NoAudio) => Some(Error),
            (Done | Error, AutoReset) => Some(Idle),
            (Done, Consumed) => Some(Idle),
            (Recording | Stopping | Uploading, Stale) => Some(Idle),
            _ => None,
        }
    }

    pub fn accepts(self, event: Event) -> bool {
        self.next(event).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Event::*;
    use OperationStatus::*;

    #[test]
    fn happy_path() {
        let mut status = Idle;
        for (event, expected) in [
            (StartRequested, Recording),
            (StopRequested, Stopping),
            (CaptureFinalized, Uploading),
            (UploadSucceeded, Done),
            (AutoReset, Idle),
        ] {
            status = status.next(event).unwrap();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn failures_lead_to_error() {
        assert_eq!(Recording.next(CaptureFailed), Some(Error));
        assert_eq!(Idle.next(CaptureFailed), Some(Error));
        assert_eq!(Stopping.next(NoAudio), Some(Error));
        assert_eq!(Uploading.next(UploadFailed), Some(Error));
        assert_eq!(Error.next(AutoReset), Some(Idle));
    }

    #[test]
    fn start_while_recording_is_rejected() {
        assert_eq!(Recording.next(StartRequested), None);
        assert_eq!(Uploading.next(StartRequested), None);
        assert_eq!(Stopping.next(StartRequested), None);
    }

    #[test]
    fn fresh_start_supersedes_terminal_states() {
        assert_eq!(Done.next(StartRequested), Some(Recording));
        assert_eq!(Error.next(StartRequested), Some(Recording));
    }

    #[test]
    fn stop_only_from_recording() {
        for status in [Idle, Stopping, Uploading, Done, Error] {
            assert!(!status.accepts(StopRequested), "{status}");
        }
    }

    #[test]
    fn only_in_flight_states_go_stale() {
        assert_eq!(Recording.next(Stale), Some(Idle));
        assert_eq!(Stopping.next(Stale), Some(Idle));
        assert_eq!(Uploading.next(Stale), Some(Idle));
        assert_eq!(Idle.next(Stale), None);
        assert_eq!(Done.next(Stale), None);
    }

    #[test]
    fn only_done_can_be_consumed() {
        assert_eq!(Done.next(Consumed), Some(Idle));
        assert_eq!(Error.next(Consumed), None);
        assert_eq!(Recording.next(Consumed), None);
    }

    #[test]
    fn auto_reset_ignored_outside_terminal_states() {
        for status in [Idle, Recording, Stopping, Uploading] {
            assert_eq!(status.next(AutoReset), None);
        }
    }
}
