//! The shared operation record and its staleness test.
//!
//! [`OperationState`] is immutable value data: every transition builds a
//! complete replacement through one of the per-status constructors, which is
//! what keeps `transcription` confined to `Done` and `error_message` confined
//! to `Error`.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OperationStatus
// ---------------------------------------------------------------------------

/// Phase of the single in-flight operation shared by both processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// The capture owner is recording audio.
    Recording,
    /// Stop was requested; capture is being finalized.
    Stopping,
    /// Audio is being uploaded for transcription.
    Uploading,
    /// A transcript is available.
    Done,
    /// The operation failed; `error_message` says why.
    Error,
}

impl OperationStatus {
    /// `Done` and `Error` auto-expire back to `Idle`.
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Done | OperationStatus::Error)
    }

    /// `Stopping` and `Uploading`: work is in progress but no audio is being
    /// captured any more.
    pub fn is_busy(self) -> bool {
        matches!(self, OperationStatus::Stopping | OperationStatus::Uploading)
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationStatus::Idle => "idle",
            OperationStatus::Recording => "recording",
            OperationStatus::Stopping => "stopping",
            OperationStatus::Uploading => "uploading",
            OperationStatus::Done => "done",
            OperationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

/// Age after which an unattended `Recording` record is considered abandoned.
pub const RECORDING_STALE_AFTER: Duration = Duration::from_secs(30);

/// Age after which an unattended `Stopping` / `Uploading` record is
/// considered abandoned. Upload timeout (60 s) plus margin.
pub const BUSY_STALE_AFTER: Duration = Duration::from_secs(90);

/// Thresholds used by [`OperationState::is_stale_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    pub recording: Duration,
    pub busy: Duration,
}

impl Default for Staleness {
    fn default() -> Self {
        Self {
            recording: RECORDING_STALE_AFTER,
            busy: BUSY_STALE_AFTER,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationState
// ---------------------------------------------------------------------------

/// The single record persisted in the shared store.
///
/// Serialized layout:
///
/// ```text
/// {
///   "status": "done",
///   "transcription": "Hello world",
///   "errorMessage": null,            (omitted when absent)
///   "timestamp": "2026-01-01T12:00:00.123456789Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transcription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl OperationState {
    fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            transcription: None,
            error_message: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn idle() -> Self {
        Self::with_status(OperationStatus::Idle)
    }

    pub fn recording() -> Self {
        Self::with_status(OperationStatus::Recording)
    }

    pub fn stopping() -> Self {
        Self::with_status(OperationStatus::Stopping)
    }

    pub fn uploading() -> Self {
        Self::with_status(OperationStatus::Uploading)
    }

    pub fn done(transcription: impl Into<String>) -> Self {
        Self {
            transcription: Some(transcription.into()),
            ..Self::with_status(OperationStatus::Done)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::with_status(OperationStatus::Error)
        }
    }

    /// Same record with its timestamp replaced. Used when replaying records
    /// from another clock and in tests.
    pub fn at(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Same record with no timestamp at all (treated as maximally stale).
    pub fn without_timestamp(self) -> Self {
        Self {
            timestamp: None,
            ..self
        }
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn transcription(&self) -> Option<&str> {
        self.transcription.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Whether this record looks abandoned at `now`.
    ///
    /// Only `Recording` (and, with a longer threshold, `Stopping` /
    /// `Uploading`) can go stale. A missing timestamp is maximally stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>, staleness: &Staleness) -> bool {
        let limit = match self.status {
            OperationStatus::Recording => staleness.recording,
            OperationStatus::Stopping | OperationStatus::Uploading => staleness.busy,
            _ => return false,
        };

        let Some(timestamp) = self.timestamp else {
            return true;
        };

        let limit = TimeDelta::from_std(limit).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(timestamp) > limit
    }

    /// [`is_stale_at`](Self::is_stale_at) against the wall clock and the
    /// default thresholds.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now(), &Staleness::default())
    }

    /// Two records describe the same write when status and timestamp match.
    pub fn same_write(&self, other: &OperationState) -> bool {
        self.status == other.status && self.timestamp == other.timestamp
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::idle()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn secs_ago(secs: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::seconds(secs)
    }

    #[test]
    fn default_state_is_idle_with_timestamp() {
        let state = OperationState::default();
        assert_eq!(state.status(), OperationStatus::Idle);
        assert!(state.transcription().is_none());
        assert!(state.error_message().is_none());
        assert!(state.timestamp().is_some());
    }

    #[test]
    fn text_fields_follow_status() {
        let done = OperationState::done("Hello world");
        assert_eq!(done.transcription(), Some("Hello world"));
        assert!(done.error_message().is_none());

        let failed = OperationState::failed("No audio recorded");
        assert_eq!(failed.error_message(), Some("No audio recorded"));
        assert!(failed.transcription().is_none());

        for state in [
            OperationState::idle(),
            OperationState::recording(),
            OperationState::stopping(),
            OperationState::uploading(),
        ] {
            assert!(state.transcription().is_none());
            assert!(state.error_message().is_none());
        }
    }

    #[test]
    fn recording_past_threshold_is_stale() {
        let state = OperationState::recording().at(secs_ago(31));
        assert!(state.is_stale());
    }

    #[test]
    fn recording_one_second_inside_threshold_is_not_stale() {
        let state = OperationState::recording().at(secs_ago(29));
        assert!(!state.is_stale());
    }

    #[test]
    fn fresh_recording_is_not_stale() {
        assert!(!OperationState::recording().is_stale());
    }

    #[test]
    fn missing_timestamp_is_maximally_stale() {
        let state = OperationState::recording().without_timestamp();
        assert!(state.is_stale());
    }

    #[test]
    fn idle_and_terminal_states_never_go_stale() {
        let old = secs_ago(3_600);
        assert!(!OperationState::idle().at(old).is_stale());
        assert!(!OperationState::done("x").at(old).is_stale());
        assert!(!OperationState::failed("x").at(old).is_stale());
        assert!(!OperationState::idle().without_timestamp().is_stale());
    }

    #[test]
    fn busy_states_use_the_longer_threshold() {
        assert!(!OperationState::uploading().at(secs_ago(60)).is_stale());
        assert!(OperationState::uploading().at(secs_ago(91)).is_stale());
        assert!(!OperationState::stopping().at(secs_ago(45)).is_stale());
        assert!(OperationState::stopping().at(secs_ago(120)).is_stale());
    }

    #[test]
    fn custom_thresholds_are_honoured() {
        let staleness = Staleness {
            recording: Duration::from_secs(5),
            busy: Duration::from_secs(10),
        };
        let now = Utc::now();
        let state = OperationState::recording().at(now - TimeDelta::seconds(6));
        assert!(state.is_stale_at(now, &staleness));
    }

    #[test]
    fn serialized_field_names() {
        let json = serde_json::to_value(OperationState::failed("boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["errorMessage"], "boom");
        assert!(json.get("transcription").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn document_without_timestamp_decodes_as_none() {
        let state: OperationState = serde_json::from_str(r#"{"status":"recording"}"#).unwrap();
        assert_eq!(state.status(), OperationStatus::Recording);
        assert!(state.timestamp().is_none());
        assert!(state.is_stale());
    }

    #[test]
    fn same_write_compares_status_and_timestamp() {
        let a = OperationState::done("one");
        let b = a.clone();
        assert!(a.same_write(&b));
        let c = OperationState::done("one").at(secs_ago(1));
        assert!(!a.same_write(&c));
    }
}
