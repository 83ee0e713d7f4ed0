//! Request options and the uniform response envelope returned to callers.

use crate::audio::asset::format_size;
use crate::pipeline::orchestrator::PipelineResult;
use crate::pipeline::types::SegmentError;
use crate::stt::provider::TranscriptionOptions;
use serde::{Deserialize, Serialize};

/// Per-request overrides supplied alongside the recording.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionRequest {
    pub language: Option<String>,
    pub prompt_hint: Option<String>,
    pub temperature: Option<f32>,
}

impl TranscriptionRequest {
    /// Apply the overrides on top of configured defaults.
    pub fn options(&self, base: &TranscriptionOptions) -> TranscriptionOptions {
        let mut options = base.clone();
        if let Some(language) = self.language.as_deref().filter(|l| !l.trim().is_empty()) {
            options = options.with_language(language);
        }
        if let Some(prompt) = &self.prompt_hint {
            options = options.with_prompt(prompt.clone());
        }
        if let Some(temperature) = self.temperature {
            options = options.with_temperature(temperature);
        }
        options
    }
}

/// JSON shape handed back to the caller for every run, success or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub success: bool,
    pub transcript: String,
    /// Seconds of audio transcribed.
    pub duration: f64,
    pub confidence: f32,
    pub segmented: bool,
    pub errors: Vec<SegmentError>,
    /// Human-readable size of the submitted recording.
    pub file_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TranscriptionResponse {
    pub fn from_result(result: &PipelineResult, file_size: u64) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                transcript: outcome.text.clone(),
                duration: outcome.total_duration,
                confidence: outcome.aggregate_confidence,
                segmented: outcome.segmented,
                errors: outcome.errors.clone(),
                file_size: format_size(file_size),
                message: outcome
                    .is_partial()
                    .then(|| partial_notice(outcome.errors.len())),
            },
            Err(failure) => {
                let mut response = Self {
                    success: false,
                    transcript: String::new(),
                    duration: 0.0,
                    confidence: 0.0,
                    segmented: false,
                    errors: Vec::new(),
                    file_size: format_size(file_size),
                    message: Some(failure.error.user_message()),
                };
                if let Some(outcome) = &failure.outcome {
                    response.transcript = outcome.text.clone();
                    response.duration = outcome.total_duration;
                    response.confidence = outcome.aggregate_confidence;
                    response.segmented = outcome.segmented;
                    response.errors = outcome.errors.clone();
                }
                response
            }
        }
    }

    /// Transcript worth showing, including text recovered by a failed run.
    pub fn printable_transcript(&self) -> Option<&str> {
        Some(self.transcript.as_str()).filter(|t| !t.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Notice attached to a degraded but usable transcript.
pub fn partial_notice(failed: usize) -> String {
    format!("Partially transcribed: {} segment(s) failed", failed)
}
