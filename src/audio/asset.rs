//! The recording handed to the pipeline.

use crate::audio::format::AudioFormat;
use crate::error::{Result, ScribeError};
use std::path::Path;
use std::time::Duration;

/// Raw audio bytes plus the declared content type.
///
/// Owned by the caller; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    bytes: Vec<u8>,
    mime_type: String,
    duration: Option<Duration>,
}

impl AudioAsset {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            duration: None,
        }
    }

    /// Attach a duration already known to the caller (e.g. from the recorder).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Read a recording from disk.
    ///
    /// When `mime_type` is `None` it is inferred from the file extension.
    pub fn from_path(path: &Path, mime_type: Option<&str>) -> Result<Self> {
        let mime_type = match mime_type {
            Some(mime) => mime.to_string(),
            None => path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(AudioFormat::from_extension)
                .map(|format| format.mime_type().to_string())
                .ok_or_else(|| {
                    ScribeError::Other(format!(
                        "Cannot infer audio type of {}; pass --mime explicitly",
                        path.display()
                    ))
                })?,
        };
        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size formatted for display, e.g. `"40.00 MB"`.
    pub fn human_size(&self) -> String {
        format_size(self.len())
    }
}

/// Format a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
