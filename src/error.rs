//! Error types for clinscribe.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Validation errors (fatal, nothing is transcribed)
    #[error("Unsupported audio format '{mime_type}'. Supported formats: {supported}")]
    UnsupportedFormat { mime_type: String, supported: String },

    #[error("Audio file is empty")]
    EmptyAsset,

    // Segmentation errors (fatal when splitting is required)
    #[error("Cannot split {format} audio safely: {message}")]
    Segmentation { format: String, message: String },

    // Pipeline-level transcription errors
    #[error("Transcription failed for all {segments} segment(s)")]
    AllSegmentsFailed { segments: usize },

    #[error("Segment results incomplete: {message}")]
    IncompleteResults { message: String },

    #[error("Transcription cancelled")]
    Cancelled,

    // Provider construction errors
    #[error("Provider setup failed: {message}")]
    ProviderSetup { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    /// True for errors raised before any provider call (bad format, empty asset).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScribeError::UnsupportedFormat { .. } | ScribeError::EmptyAsset
        )
    }

    /// True for errors raised while cutting the asset into segments.
    pub fn is_segmentation(&self) -> bool {
        matches!(self, ScribeError::Segmentation { .. })
    }

    /// Message suitable for showing to the clinician who submitted the recording.
    pub fn user_message(&self) -> String {
        match self {
            ScribeError::UnsupportedFormat {
                mime_type,
                supported,
            } => format!(
                "The recording format '{}' is not supported. Please upload one of: {}.",
                mime_type, supported
            ),
            ScribeError::EmptyAsset => {
                "The recording is empty. Please record or upload the consultation again."
                    .to_string()
            }
            ScribeError::Segmentation { format, .. } => format!(
                "This {} recording is too large to transcribe in one piece and cannot be split. \
                 Please upload it as WAV or MP3.",
                format
            ),
            ScribeError::AllSegmentsFailed { .. } => {
                "Transcription failed for the whole recording. Please retry in a moment."
                    .to_string()
            }
            ScribeError::Cancelled => "Transcription was cancelled.".to_string(),
            other => format!("Transcription failed: {}", other),
        }
    }
}

/// Classified failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider rejected audio as malformed: {message}")]
    MalformedAudio { message: String },

    #[error("provider unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("provider rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("provider call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid provider response: {message}")]
    InvalidResponse { message: String },

    #[error("segment of {size} bytes exceeds the {ceiling} byte provider ceiling")]
    TooLarge { size: u64, ceiling: u64 },
}

impl ProviderError {
    /// Whether a later attempt with the same audio might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::Unavailable { .. }
                | ProviderError::Timeout(_)
        )
    }

    /// Delay requested by the provider before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = ScribeError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = ScribeError::ConfigInvalidValue {
            key: "limits.max_segment_bytes".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for limits.max_segment_bytes: must be positive"
        );
    }

    #[test]
    fn test_unsupported_format_names_type_and_supported_list() {
        let error = ScribeError::UnsupportedFormat {
            mime_type: "video/mp4".to_string(),
            supported: "audio/wav, audio/mpeg".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("video/mp4"));
        assert!(msg.contains("audio/wav, audio/mpeg"));
    }

    #[test]
    fn test_segmentation_display() {
        let error = ScribeError::Segmentation {
            format: "webm".to_string(),
            message: "container cannot be cut on byte boundaries".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot split webm audio safely: container cannot be cut on byte boundaries"
        );
    }

    #[test]
    fn test_all_segments_failed_display() {
        let error = ScribeError::AllSegmentsFailed { segments: 3 };
        assert_eq!(
            error.to_string(),
            "Transcription failed for all 3 segment(s)"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(ScribeError::EmptyAsset.is_validation());
        assert!(
            ScribeError::UnsupportedFormat {
                mime_type: "text/plain".to_string(),
                supported: String::new(),
            }
            .is_validation()
        );
        assert!(!ScribeError::Cancelled.is_validation());
        assert!(
            ScribeError::Segmentation {
                format: "ogg".to_string(),
                message: String::new(),
            }
            .is_segmentation()
        );
    }

    #[test]
    fn test_user_message_for_unsupported_format_lists_formats() {
        let error = ScribeError::UnsupportedFormat {
            mime_type: "video/mp4".to_string(),
            supported: "audio/wav, audio/mpeg".to_string(),
        };
        let msg = error.user_message();
        assert!(msg.contains("video/mp4"));
        assert!(msg.contains("audio/wav"));
    }

    #[test]
    fn test_user_message_for_total_failure_prompts_retry() {
        let msg = ScribeError::AllSegmentsFailed { segments: 2 }.user_message();
        assert!(msg.contains("retry"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ScribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: ScribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ScribeError>();
        assert_sync::<ScribeError>();
        assert_send::<ProviderError>();
        assert_sync::<ProviderError>();
    }

    #[test]
    fn test_provider_error_transience() {
        assert!(
            ProviderError::Network {
                message: "reset".to_string()
            }
            .is_transient()
        );
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(
            ProviderError::Unavailable {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(
            !ProviderError::MalformedAudio {
                message: "bad header".to_string()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Rejected {
                status: 401,
                message: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_provider_error_retry_after() {
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(ProviderError::Timeout(Duration::from_secs(1)).retry_after(), None);
    }

    #[test]
    fn test_too_large_is_permanent() {
        let err = ProviderError::TooLarge {
            size: 30,
            ceiling: 20,
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "segment of 30 bytes exceeds the 20 byte provider ceiling"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = ProviderError::Timeout(Duration::from_secs(120));
        assert_eq!(err.to_string(), "provider call timed out after 120s");
    }
}
