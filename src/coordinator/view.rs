//! What a recording surface shows for a given shared record.

use crate::state::{OperationState, OperationStatus};

pub const TRANSCRIBING_LABEL: &str = "Transcribing…";

/// Widget visibility and status text derived from an [`OperationState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub mic_visible: bool,
    pub stop_visible: bool,
    pub spinner_visible: bool,
    /// `None` hides the status line.
    pub status_text: Option<String>,
}

impl ViewModel {
    pub fn from_state(state: &OperationState) -> Self {
        let recording = state.status() == OperationStatus::Recording;
        let busy = matches!(
            state.status(),
            OperationStatus::Stopping | OperationStatus::Uploading
        );

        let status_text = match state.status() {
            OperationStatus::Stopping | OperationStatus::Uploading => {
                Some(TRANSCRIBING_LABEL.to_string())
            }
            OperationStatus::Error => {
                Some(state.error_message().unwrap_or("Error").to_string())
            }
            OperationStatus::Idle | OperationStatus::Recording | OperationStatus::Done => None,
        };

        Self {
            mic_visible: !recording && !busy,
            stop_visible: recording,
            spinner_visible: busy,
            status_text,
        }
    }
}

impl From<&OperationState> for ViewModel {
    fn from(state: &OperationState) -> Self {
        Self::from_state(state)
    }
}
