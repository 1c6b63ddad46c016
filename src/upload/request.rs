//! Building the multipart transcription request.

use std::time::Duration;

use url::Url;
use uuid::Uuid;

use super::UploadError;
use crate::config::TranscriptionMode;

/// Fixed endpoint for [`TranscriptionMode::OpenAi`].
pub const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub const AUDIO_FILENAME: &str = "recording.wav";
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

/// Everything needed to address the transcription backend for one attempt.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct UploadConfig {
    pub mode: TranscriptionMode,
    /// Provider credential (OpenAI mode).
    pub api_key: String,
    /// Provider model identifier, e.g. `"gpt-4o-transcribe"`.
    pub model: String,
    /// Endpoint for custom mode.
    pub custom_url: String,
    /// Raw `Authorization` value for custom mode; empty means none.
    pub custom_auth_header: String,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(secret: &str) -> &'static str {
            if secret.is_empty() {
                "<empty>"
            } else {
                "<redacted>"
            }
        }

        f.debug_struct("UploadConfig")
            .field("mode", &self.mode)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("custom_url", &self.custom_url)
            .field("custom_auth_header", &redact(&self.custom_auth_header))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// UploadRequest
// ---------------------------------------------------------------------------

/// A fully prepared request, independent of any HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub method: &'static str,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl UploadRequest {
    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Multipart encoding
// ---------------------------------------------------------------------------

struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            body: Vec::new(),
        }
    }

    fn file_part(&mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) {
        self.open_part();
        self.line(&format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\""
        ));
        self.line(&format!("Content-Type: {content_type}"));
        self.line("");
        self.body.extend_from_slice(data);
        self.line("");
    }

    fn text_part(&mut self, name: &str, value: &str) {
        self.open_part();
        self.line(&format!("Content-Disposition: form-data; name=\"{name}\""));
        self.line("");
        self.body.extend_from_slice(value.as_bytes());
        self.line("");
    }

    fn finish(mut self) -> Vec<u8> {
        let closing = format!("--{}--", self.boundary);
        self.line(&closing);
        self.body
    }

    fn open_part(&mut self) {
        let opening = format!("--{}", self.boundary);
        self.line(&opening);
    }

    fn line(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
        self.body.extend_from_slice(b"\r\n");
    }
}

// ---------------------------------------------------------------------------
// build_request
// ---------------------------------------------------------------------------

/// Build the upload for `audio` with a fresh random boundary.
pub fn build_request(config: &UploadConfig, audio: &[u8]) -> Result<UploadRequest, UploadError> {
    build_request_with_boundary(config, audio, &Uuid::new_v4().to_string())
}

/// [`build_request`] with a caller-chosen boundary token.
pub fn build_request_with_boundary(
    config: &UploadConfig,
    audio: &[u8],
    boundary: &str,
) -> Result<UploadRequest, UploadError> {
    let url = match config.mode {
        TranscriptionMode::OpenAi => {
            if config.api_key.is_empty() {
                return Err(UploadError::MissingCredential);
            }
            Url::parse(OPENAI_TRANSCRIPTION_URL).map_err(|_| UploadError::InvalidEndpoint)?
        }
        TranscriptionMode::Custom => parse_endpoint(&config.custom_url)?,
    };

    let mut headers = vec![(
        "Content-Type".to_string(),
        format!("multipart/form-data; boundary={boundary}"),
    )];

    match config.mode {
        TranscriptionMode::OpenAi => {
            headers.push(("Authorization".into(), format!("Bearer {}", config.api_key)));
        }
        TranscriptionMode::Custom => {
            if !config.custom_auth_header.is_empty() {
                headers.push(("Authorization".into(), config.custom_auth_header.clone()));
            }
        }
    }

    let mut body = MultipartBody::new(boundary);
    body.file_part("file", AUDIO_FILENAME, AUDIO_CONTENT_TYPE, audio);
    if config.mode == TranscriptionMode::OpenAi {
        body.text_part("model", &config.model);
    }

    Ok(UploadRequest {
        method: "POST",
        url,
        headers,
        body: body.finish(),
        timeout: UPLOAD_TIMEOUT,
    })
}

fn parse_endpoint(raw: &str) -> Result<Url, UploadError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UploadError::InvalidEndpoint);
    }

    let url = Url::parse(raw).map_err(|_| UploadError::InvalidEndpoint)?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(UploadError::InvalidEndpoint),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(api_key: &str) -> UploadConfig {
        UploadConfig {
            mode: TranscriptionMode::OpenAi,
            api_key: api_key.into(),
            model: "whisper-1".into(),
            ..UploadConfig::default()
        }
    }

    fn custom(url: &str, header: &str) -> UploadConfig {
        UploadConfig {
            mode: TranscriptionMode::Custom,
            custom_url: url.into(),
            custom_auth_header: header.into(),
            ..UploadConfig::default()
        }
    }

    #[test]
    fn openai_request_targets_fixed_endpoint_with_bearer() {
        let request = build_request(&openai("sk-test"), b"fake audio").unwrap();

        assert_eq!(request.url.as_str(), OPENAI_TRANSCRIPTION_URL);
        assert_eq!(request.method, "POST");
        assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
        assert!(request
            .header("Content-Type")
            .is_some_and(|v| v.starts_with("multipart/form-data; boundary=")));
        assert_eq!(request.timeout, Duration::from_secs(60));
    }

    #[test]
    fn openai_without_key_is_missing_credential_regardless_of_other_fields() {
        let mut config = openai("");
        assert_eq!(build_request(&config, b"a"), Err(UploadError::MissingCredential));

        config.custom_url = "https://example.com/transcribe".into();
        config.custom_auth_header = "Bearer other".into();
        config.model = "gpt-4o-transcribe".into();
        assert_eq!(build_request(&config, b""), Err(UploadError::MissingCredential));
    }

    #[test]
    fn custom_request_uses_configured_url_and_verbatim_header() {
        let request =
            build_request(&custom("https://my-server.com/transcribe", "Token abc=="), b"x").unwrap();

        assert_eq!(request.url.as_str(), "https://my-server.com/transcribe");
        assert_eq!(request.header("Authorization"), Some("Token abc=="));
    }

    #[test]
    fn custom_request_without_header_has_no_authorization() {
        let request = build_request(&custom("https://my-server.com/transcribe", ""), b"x").unwrap();
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn custom_with_empty_or_unparsable_url_is_invalid_endpoint() {
        for url in ["", "   ", "not a url", "my-server.com/transcribe", "ftp://host/x", "https://"] {
            assert_eq!(
                build_request(&custom(url, "Bearer t"), b"x"),
                Err(UploadError::InvalidEndpoint),
                "{url:?}"
            );
        }
    }

    #[test]
    fn openai_body_has_audio_and_model_parts() {
        let request = build_request_with_boundary(&openai("sk"), b"AUDIO", "B0UND").unwrap();
        let expected = concat!(
            "--B0UND\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"recording.wav\"\r\n",
            "Content-Type: audio/wav\r\n",
            "\r\n",
            "AUDIO\r\n",
            "--B0UND\r\n",
            "Content-Disposition: form-data; name=\"model\"\r\n",
            "\r\n",
            "whisper-1\r\n",
            "--B0UND--\r\n",
        );
        assert_eq!(String::from_utf8(request.body).unwrap(), expected);
    }

    #[test]
    fn custom_body_has_only_the_audio_part() {
        let request = build_request_with_boundary(
            &custom("http://localhost:8080/asr", ""),
            b"AUDIO",
            "B0UND",
        )
        .unwrap();
        let body = String::from_utf8(request.body).unwrap();
        assert!(!body.contains("name=\"model\""));
        assert!(body.ends_with("AUDIO\r\n--B0UND--\r\n"));
        assert_eq!(body.matches("--B0UND\r\n").count(), 1);
    }

    #[test]
    fn binary_audio_is_copied_verbatim() {
        let audio = [0u8, 159, 146, 150, 13, 10, 255];
        let request = build_request_with_boundary(&openai("k"), &audio, "b").unwrap();
        assert!(request.body.windows(audio.len()).any(|w| w == audio));
    }

    #[test]
    fn boundaries_are_random() {
        let a = build_request(&openai("k"), b"x").unwrap();
        let b = build_request(&openai("k"), b"x").unwrap();
        assert_ne!(a.header("Content-Type"), b.header("Content-Type"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", openai("sk-very-secret"));
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
