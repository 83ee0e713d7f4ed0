use crate::audio::format::{AudioFormat, FormatValidator};
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::stt::provider::TranscriptionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub limits: LimitsConfig,
    pub transcription: TranscriptionConfig,
    pub retry: RetryConfig,
}

/// Speech-to-text provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub endpoint_path: String,
    pub model: String,
    /// Empty means "read OPENAI_API_KEY at startup".
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Payload ceiling and format allow-list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_segment_bytes: u64,
    pub supported_formats: Vec<String>,
}

/// Per-request transcription defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub language: String,
    pub temperature: f32,
    pub prompt: String,
    pub response_format: String,
    pub concurrency: usize,
}

/// Backoff for transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
            endpoint_path: defaults::DEFAULT_ENDPOINT_PATH.to_string(),
            model: defaults::DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout_secs: defaults::SEGMENT_TIMEOUT_SECS,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: defaults::MAX_SEGMENT_BYTES,
            supported_formats: defaults::SUPPORTED_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            temperature: defaults::DEFAULT_TEMPERATURE,
            prompt: String::new(),
            response_format: defaults::DEFAULT_RESPONSE_FORMAT.to_string(),
            concurrency: defaults::CONCURRENCY,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CLINSCRIBE_LANGUAGE → transcription.language
    /// - CLINSCRIBE_MODEL → provider.model
    /// - CLINSCRIBE_BASE_URL → provider.base_url
    /// - CLINSCRIBE_MAX_SEGMENT_BYTES → limits.max_segment_bytes
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(language) = std::env::var("CLINSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.transcription.language = language;
        }

        if let Ok(model) = std::env::var("CLINSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.provider.model = model;
        }

        if let Ok(base_url) = std::env::var("CLINSCRIBE_BASE_URL")
            && !base_url.is_empty()
        {
            self.provider.base_url = base_url;
        }

        if let Ok(max_bytes) = std::env::var("CLINSCRIBE_MAX_SEGMENT_BYTES")
            && !max_bytes.is_empty()
        {
            self.limits.max_segment_bytes =
                max_bytes
                    .parse()
                    .map_err(|e| ScribeError::ConfigInvalidValue {
                        key: "CLINSCRIBE_MAX_SEGMENT_BYTES".to_string(),
                        message: format!("{}", e),
                    })?;
        }

        Ok(self)
    }

    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_segment_bytes == 0 {
            return Err(invalid("limits.max_segment_bytes", "must be greater than 0"));
        }
        if self.limits.supported_formats.is_empty() {
            return Err(invalid(
                "limits.supported_formats",
                "at least one format is required",
            ));
        }
        for name in &self.limits.supported_formats {
            if AudioFormat::from_name(name).is_none() {
                return Err(invalid(
                    "limits.supported_formats",
                    &format!("unknown format '{}'", name),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.transcription.temperature) {
            return Err(invalid(
                "transcription.temperature",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.transcription.concurrency == 0 {
            return Err(invalid("transcription.concurrency", "must be at least 1"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(invalid("provider.timeout_secs", "must be greater than 0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Build the format validator described by `limits.supported_formats`.
    ///
    /// Unknown names are skipped; `validate()` reports them.
    pub fn format_validator(&self) -> FormatValidator {
        FormatValidator::new(
            self.limits
                .supported_formats
                .iter()
                .filter_map(|name| AudioFormat::from_name(name))
                .collect(),
        )
    }

    /// Default per-request options from `[transcription]`.
    pub fn transcription_options(&self) -> TranscriptionOptions {
        TranscriptionOptions {
            language: self.transcription.language.clone(),
            prompt: None,
            temperature: self.transcription.temperature,
            response_format: self.transcription.response_format.clone(),
        }
        .with_prompt(self.transcription.prompt.clone())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/clinscribe/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("clinscribe").join("config.toml"))
    }
}

fn invalid(key: &str, message: &str) -> ScribeError {
    ScribeError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
