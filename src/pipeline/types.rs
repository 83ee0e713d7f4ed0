//! Data types flowing through the transcription pipeline.

use serde::Serialize;
use std::fmt;

/// Outcome of transcribing one segment. Exactly one exists per segment index.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    /// Segment ordinal, starting at 0.
    pub index: usize,
    /// Transcribed text; empty when the segment failed.
    pub text: String,
    /// Seconds of audio covered; 0 when the segment failed.
    pub duration: f64,
    /// Provider confidence in `[0, 1]`; 0 when the segment failed.
    pub confidence: f32,
    /// Failure reason, if the segment could not be transcribed.
    pub error: Option<String>,
}

impl SegmentResult {
    pub fn success(index: usize, text: impl Into<String>, duration: f64, confidence: f32) -> Self {
        Self {
            index,
            text: text.into(),
            duration,
            confidence,
            error: None,
        }
    }

    pub fn failure(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            text: String::new(),
            duration: 0.0,
            confidence: 0.0,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A failed segment as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentError {
    pub index: usize,
    pub message: String,
}

/// The merged result of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutcome {
    pub text: String,
    /// Sum of all segment durations, in seconds.
    pub total_duration: f64,
    /// Mean confidence across successful segments only.
    pub aggregate_confidence: f32,
    /// Whether the recording was split before transcription.
    pub segmented: bool,
    /// Number of segments transcribed (or attempted).
    pub segments: usize,
    /// One entry per failed segment, in index order.
    pub errors: Vec<SegmentError>,
}

impl TranscriptionOutcome {
    pub fn succeeded_segments(&self) -> usize {
        self.segments - self.errors.len()
    }

    /// No segment failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Some segments failed, at least one succeeded.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() && self.succeeded_segments() > 0
    }

    /// Nothing was transcribed.
    pub fn is_total_failure(&self) -> bool {
        self.succeeded_segments() == 0
    }
}

/// States of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Validating,
    /// Asset fits the ceiling and is sent whole.
    Direct,
    Splitting,
    Transcribing,
    Aggregating,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Direct => "direct",
            Self::Splitting => "splitting",
            Self::Transcribing => "transcribing",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    SegmentStarted {
        index: usize,
        total: usize,
    },
    SegmentFinished {
        index: usize,
        total: usize,
        success: bool,
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(segments: usize, failed: &[usize]) -> TranscriptionOutcome {
        TranscriptionOutcome {
            text: String::new(),
            total_duration: 0.0,
            aggregate_confidence: 0.0,
            segmented: segments > 1,
            segments,
            errors: failed
                .iter()
                .map(|&index| SegmentError {
                    index,
                    message: "boom".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn failure_result_contributes_nothing() {
        let result = SegmentResult::failure(3, "rate limited");
        assert_eq!(result.index, 3);
        assert_eq!(result.text, "");
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_success());
    }

    #[test]
    fn outcome_classes() {
        let clean = outcome(3, &[]);
        assert!(clean.is_clean() && !clean.is_partial() && !clean.is_total_failure());

        let partial = outcome(3, &[1]);
        assert!(!partial.is_clean() && partial.is_partial() && !partial.is_total_failure());
        assert_eq!(partial.succeeded_segments(), 2);

        let failed = outcome(2, &[0, 1]);
        assert!(!failed.is_partial() && failed.is_total_failure());
    }

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Transcribing.is_terminal());
        assert_eq!(PipelineState::Splitting.to_string(), "splitting");
    }

    #[test]
    fn segment_error_serializes() {
        let error = SegmentError {
            index: 1,
            message: "timeout".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json, serde_json::json!({"index": 1, "message": "timeout"}));
    }
}
