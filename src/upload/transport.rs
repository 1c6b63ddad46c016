//! The `Transport` seam and its reqwest implementation.

use async_trait::async_trait;
use thiserror::Error;

use super::request::UploadRequest;

// ---------------------------------------------------------------------------
// TransportResponse / TransportError
// ---------------------------------------------------------------------------

/// Raw response: status code and undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("The request timed out.")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends a prepared [`UploadRequest`].
///
/// Implementors must be `Send + Sync` so they can be shared with the upload
/// task as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &UploadRequest) -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// reqwest-backed transport. The per-request timeout comes from
/// [`UploadRequest::timeout`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dictation-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UploadRequest) -> Result<TransportResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, request.url.clone())
            .timeout(request.timeout)
            .body(request.body.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        log::debug!(
            "transport: {} {} ({} bytes)",
            request.method,
            request.url,
            request.body.len()
        );

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        log::debug!("transport: HTTP {status}, {} byte body", body.len());
        Ok(TransportResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// MockTransport  (test-only)
// ---------------------------------------------------------------------------

/// Returns a canned response and remembers every request it was given.
#[cfg(test)]
pub struct MockTransport {
    response: Result<TransportResponse, TransportError>,
    requests: std::sync::Mutex<Vec<UploadRequest>>,
}

#[cfg(test)]
impl MockTransport {
    /// `200` with `{"text": <text>}`.
    pub fn ok(text: &str) -> Self {
        let body = serde_json::json!({ "text": text }).to_string();
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Ok(TransportResponse {
                status,
                body: body.into(),
            }),
            requests: Default::default(),
        }
    }

    pub fn fails(error: TransportError) -> Self {
        Self {
            response: Err(error),
            requests: Default::default(),
        }
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &UploadRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}
