//! Audio upload and transcription.
//!
//! # Pipeline
//!
//! ```text
//! audio bytes + UploadConfig
//!        │
//!        ▼
//! build_request()  ── MissingCredential / InvalidEndpoint (no network)
//!        │
//!        ▼
//! Transport::send()  ── Transport error / timeout (60 s)
//!        │
//!        ▼
//! status 2xx? ── no ──▶ ServerError(body)
//!        │
//!        ▼
//! parse_result()  ── InvalidResponse
//!        │
//!        ▼
//!    transcript
//! ```
//!
//! The request is a plain value ([`UploadRequest`]) so it can be inspected in
//! tests and sent by any [`Transport`]; [`HttpTransport`] is the reqwest-backed
//! one used by the binary.

pub mod request;
pub mod service;
pub mod transport;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use request::{
    build_request, build_request_with_boundary, UploadConfig, UploadRequest, AUDIO_CONTENT_TYPE,
    AUDIO_FILENAME, OPENAI_TRANSCRIPTION_URL, UPLOAD_TIMEOUT,
};
pub use service::{execute, parse_result, transcribe};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};

#[cfg(test)]
pub use transport::MockTransport;

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

/// Why an upload attempt produced no transcript. None of these are retried
/// automatically; the user starts a new attempt instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No API key configured. Add your API key in settings.")]
    MissingCredential,

    #[error("Invalid or missing endpoint URL. Check your settings.")]
    InvalidEndpoint,

    #[error("Unexpected response from the server.")]
    InvalidResponse,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// UploadConfigSource
// ---------------------------------------------------------------------------

/// Supplies a fresh [`UploadConfig`] for every attempt, so settings changed
/// between attempts are picked up without restarting the coordinator.
pub trait UploadConfigSource: Send + Sync {
    fn upload_config(&self) -> UploadConfig;
}

impl UploadConfigSource for UploadConfig {
    fn upload_config(&self) -> UploadConfig {
        self.clone()
    }
}
