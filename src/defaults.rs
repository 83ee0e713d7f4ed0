//! Default configuration constants for clinscribe.
//!
//! Shared by the config types, the CLI and the pipeline so that every entry
//! point agrees on the same limits.

/// Provider payload ceiling in bytes (25 MiB).
///
/// Hosted Whisper-style endpoints reject uploads above this size.
pub const MAX_SEGMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Default language hint sent to the provider.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that lets the provider detect the spoken language.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default decoding temperature.
///
/// 0.0 keeps provider output deterministic for identical audio.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Response format requested from the provider.
///
/// `verbose_json` carries duration and per-utterance log probabilities,
/// which feed the aggregate duration and confidence.
pub const DEFAULT_RESPONSE_FORMAT: &str = "verbose_json";

/// Default provider base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default transcription endpoint path.
pub const DEFAULT_ENDPOINT_PATH: &str = "/v1/audio/transcriptions";

/// Default provider model.
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Per-segment provider call timeout in seconds.
pub const SEGMENT_TIMEOUT_SECS: u64 = 120;

/// Segments transcribed concurrently. 1 means strictly sequential.
pub const CONCURRENCY: usize = 1;

/// Retry attempts for transient provider failures (after the first call).
pub const MAX_RETRIES: u32 = 2;

/// First retry delay in milliseconds; doubles on each attempt.
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound for a single retry delay in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 8000;

/// Consecutive blank lines kept by transcript normalization.
pub const MAX_BLANK_LINES: usize = 1;

/// Formats accepted when the configuration does not narrow the list.
pub const SUPPORTED_FORMATS: &[&str] = &["wav", "mp3", "webm", "ogg", "flac", "m4a"];
