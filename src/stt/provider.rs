use crate::defaults;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;

/// Per-request decoding options forwarded to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOptions {
    /// ISO-639-1 code, or `"auto"` to let the provider detect it.
    pub language: String,
    /// Domain vocabulary hint (drug names, clinician names).
    pub prompt: Option<String>,
    pub temperature: f32,
    pub response_format: String,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            prompt: None,
            temperature: defaults::DEFAULT_TEMPERATURE,
            response_format: defaults::DEFAULT_RESPONSE_FORMAT.to_string(),
        }
    }
}

impl TranscriptionOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Language to send, or `None` when detection is requested.
    pub fn language_hint(&self) -> Option<&str> {
        let language = self.language.trim();
        if language.is_empty() || language.eq_ignore_ascii_case(defaults::AUTO_LANGUAGE) {
            None
        } else {
            Some(language)
        }
    }
}

/// What a provider returns for one successful call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderTranscript {
    pub text: String,
    /// Seconds of audio the provider reports having processed.
    pub duration: Option<f64>,
    /// Confidence in `[0, 1]`, when the provider exposes one.
    pub confidence: Option<f32>,
}

impl ProviderTranscript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration: None,
            confidence: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// An external speech-to-text capability.
///
/// One call transcribes one self-contained audio payload. Implementations
/// must not retry internally; the orchestrator owns retry policy.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &TranscriptionOptions,
    ) -> Result<ProviderTranscript, ProviderError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: SpeechProvider + ?Sized> SpeechProvider for Arc<T> {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &TranscriptionOptions,
    ) -> Result<ProviderTranscript, ProviderError> {
        (**self)
            .transcribe(audio, file_name, mime_type, options)
            .await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
