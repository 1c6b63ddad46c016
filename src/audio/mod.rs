//! Audio capture: microphone → mono samples → in-memory WAV.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!           → sample buffer (capped at max_recording_secs) → encode_wav
//! ```
//!
//! The coordinator only sees the [`Recorder`] trait; [`MicRecorder`] is the
//! cpal-backed implementation used by the binary.

pub mod capture;
pub mod recorder;
pub mod wav;

pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use recorder::{MicRecorder, Recorder, RecorderError};
pub use wav::{encode_wav, stereo_to_mono};

#[cfg(test)]
pub use recorder::MockRecorder;
