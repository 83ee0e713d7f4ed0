//! Declared-format validation against the provider allow-list.

use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio container formats the pipeline knows how to hand to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mpeg,
    Webm,
    Ogg,
    Flac,
    Mp4Audio,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Wav,
        AudioFormat::Mpeg,
        AudioFormat::Webm,
        AudioFormat::Ogg,
        AudioFormat::Flac,
        AudioFormat::Mp4Audio,
    ];

    /// Parse a declared MIME type.
    ///
    /// Parameters (`audio/webm;codecs=opus`) are ignored and matching is
    /// case-insensitive. `video/*` types are never accepted.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some(Self::Wav),
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some(Self::Mpeg),
            "audio/webm" => Some(Self::Webm),
            "audio/ogg" | "audio/opus" => Some(Self::Ogg),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some(Self::Mp4Audio),
            _ => None,
        }
    }

    /// Parse a short format name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" | "mpeg" => Some(Self::Mpeg),
            "webm" => Some(Self::Webm),
            "ogg" | "opus" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" => Some(Self::Mp4Audio),
            _ => None,
        }
    }

    /// Guess the format from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "mp3" | "mpga" => Some(Self::Mpeg),
            "webm" => Some(Self::Webm),
            "ogg" | "oga" | "opus" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" => Some(Self::Mp4Audio),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mpeg => "mp3",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Mp4Audio => "m4a",
        }
    }

    /// Canonical MIME type sent to the provider.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mpeg => "audio/mpeg",
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::Mp4Audio => "audio/mp4",
        }
    }

    /// File extension used when uploading a segment.
    pub fn extension(&self) -> &'static str {
        self.name()
    }

    /// Whether the segmenter can cut this container into independent pieces.
    pub fn is_splittable(&self) -> bool {
        matches!(self, Self::Wav | Self::Mpeg)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks declared MIME types against a fixed allow-list. Pure, no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatValidator {
    allowed: Vec<AudioFormat>,
}

impl FormatValidator {
    pub fn new(allowed: Vec<AudioFormat>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &[AudioFormat] {
        &self.allowed
    }

    /// Accept the MIME type or reject it, naming the type and the supported list.
    pub fn validate(&self, mime_type: &str) -> Result<AudioFormat> {
        match AudioFormat::from_mime(mime_type) {
            Some(format) if self.allowed.contains(&format) => Ok(format),
            _ => Err(ScribeError::UnsupportedFormat {
                mime_type: mime_type.to_string(),
                supported: self.supported_list(),
            }),
        }
    }

    /// Human-readable list of accepted MIME types, e.g. `audio/wav, audio/mpeg`.
    pub fn supported_list(&self) -> String {
        self.allowed
            .iter()
            .map(|f| f.mime_type())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::new(AudioFormat::ALL.to_vec())
    }
}
