//! OpenAI-compatible transcription endpoint over HTTP.
//!
//! Uploads one segment per request as `multipart/form-data` and maps every
//! failure onto a [`ProviderError`] class the orchestrator can reason about.

use crate::config::ProviderConfig;
use crate::defaults;
use crate::error::{ProviderError, Result, ScribeError};
use crate::stt::provider::{ProviderTranscript, SpeechProvider, TranscriptionOptions};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest provider error body carried into a message.
const MAX_ERROR_BODY: usize = 300;

pub struct HttpProvider {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpProvider {
    pub fn builder() -> HttpProviderBuilder {
        HttpProviderBuilder::new()
    }

    /// Build from the `[provider]` config section.
    ///
    /// An empty `api_key` falls back to `OPENAI_API_KEY`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .base_url(&config.base_url)
            .endpoint_path(&config.endpoint_path)
            .model(&config.model)
            .timeout(config.timeout());
        if !config.api_key.is_empty() {
            builder = builder.api_key(&config.api_key);
        }
        builder.build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn form(
        &self,
        audio: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &TranscriptionOptions,
    ) -> std::result::Result<reqwest::multipart::Form, ProviderError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| ProviderError::MalformedAudio {
                message: format!("invalid MIME type '{}': {}", mime_type, e),
            })?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("temperature", options.temperature.to_string())
            .text("response_format", options.response_format.clone());
        if let Some(language) = options.language_hint() {
            form = form.text("language", language.to_string());
        }
        if let Some(prompt) = &options.prompt {
            form = form.text("prompt", prompt.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl SpeechProvider for HttpProvider {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &TranscriptionOptions,
    ) -> std::result::Result<ProviderTranscript, ProviderError> {
        let form = self.form(audio, file_name, mime_type, options)?;

        let mut request = self.http_client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(
            endpoint = %self.endpoint,
            file_name,
            bytes = audio.len(),
            "sending transcription request"
        );
        let classify = |e: reqwest::Error| classify_send_error(e, self.timeout);
        let response = request.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(classify)?;

        if !(200..300).contains(&status) {
            let error = classify_status(status, retry_after, &body);
            warn!(status, file_name, error = %error, "provider returned an error");
            return Err(error);
        }

        parse_transcript(&body, &options.response_format)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

pub struct HttpProviderBuilder {
    base_url: Option<String>,
    endpoint_path: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpProviderBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            endpoint_path: None,
            model: None,
            api_key: None,
            timeout: Duration::from_secs(defaults::SEGMENT_TIMEOUT_SECS),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpProvider> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| defaults::DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ScribeError::ProviderSetup {
                message: format!("base URL must be http(s): '{}'", base_url),
            });
        }
        let endpoint_path = self
            .endpoint_path
            .unwrap_or_else(|| defaults::DEFAULT_ENDPOINT_PATH.to_string());
        let endpoint_path = if endpoint_path.starts_with('/') {
            endpoint_path
        } else {
            format!("/{}", endpoint_path)
        };

        let api_key = self
            .api_key
            .or_else(|| std::env::var(defaults::API_KEY_ENV).ok())
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!(
                "No API key configured and {} is unset; sending unauthenticated requests",
                defaults::API_KEY_ENV
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ScribeError::ProviderSetup {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(HttpProvider {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), endpoint_path),
            model: self
                .model
                .unwrap_or_else(|| defaults::DEFAULT_MODEL.to_string()),
            api_key,
            timeout: self.timeout,
        })
    }
}

impl Default for HttpProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_send_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network {
            message: error.to_string(),
        }
    }
}

/// Map a non-success HTTP status onto a provider error class.
pub fn classify_status(status: u16, retry_after: Option<Duration>, body: &str) -> ProviderError {
    let message = error_message(body);
    match status {
        429 => ProviderError::RateLimited { retry_after },
        400 | 413 | 415 | 422 => ProviderError::MalformedAudio { message },
        500..=599 => ProviderError::Unavailable { status, message },
        _ => ProviderError::Rejected { status, message },
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

/// Prefer the OpenAI-style `{"error": {"message": ...}}`, else the raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error.message;
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    #[serde(default)]
    avg_logprob: Option<f64>,
}

/// Parse a success body for the requested response format.
pub fn parse_transcript(
    body: &str,
    response_format: &str,
) -> std::result::Result<ProviderTranscript, ProviderError> {
    if response_format == "text" {
        return Ok(ProviderTranscript::new(body));
    }

    let parsed: VerboseResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
            message: format!("unparsable transcription JSON: {}", e),
        })?;

    let confidence = parsed
        .confidence
        .or_else(|| confidence_from_logprobs(&parsed.segments));

    Ok(ProviderTranscript {
        text: parsed.text,
        duration: parsed.duration,
        confidence,
    })
}

/// Mean of `exp(avg_logprob)` across utterances, clamped to `[0, 1]`.
fn confidence_from_logprobs(segments: &[VerboseSegment]) -> Option<f32> {
    let probs: Vec<f64> = segments
        .iter()
        .filter_map(|s| s.avg_logprob)
        .map(|lp| lp.exp().clamp(0.0, 1.0))
        .collect();
    if probs.is_empty() {
        return None;
    }
    Some((probs.iter().sum::<f64>() / probs.len() as f64) as f32)
}
