//! Executing an upload and turning the response into a transcript.

use serde::Deserialize;

use super::request::{build_request, UploadConfig, UploadRequest};
use super::transport::Transport;
use super::UploadError;

/// Shape of a successful transcription response.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Send `request` and return the transcript.
///
/// Any non-2xx status becomes [`UploadError::ServerError`] carrying the
/// response body (or `"Unknown error"` when the body is not UTF-8).
pub async fn execute(
    transport: &dyn Transport,
    request: &UploadRequest,
) -> Result<String, UploadError> {
    let response = transport.send(request).await?;

    if !response.is_success() {
        let message = String::from_utf8(response.body)
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::warn!("upload: server returned HTTP {}", response.status);
        return Err(UploadError::ServerError(message));
    }

    parse_result(&response.body)
}

/// Decode `{"text": "..."}`.
pub fn parse_result(bytes: &[u8]) -> Result<String, UploadError> {
    serde_json::from_slice::<TranscriptionResponse>(bytes)
        .map(|response| response.text)
        .map_err(|e| {
            log::debug!("upload: unexpected response shape: {e}");
            UploadError::InvalidResponse
        })
}

/// Build, send and parse in one go.
pub async fn transcribe(
    transport: &dyn Transport,
    config: &UploadConfig,
    audio: &[u8],
) -> Result<String, UploadError> {
    let request = build_request(config, audio)?;
    execute(transport, &request).await
}
