use crate::audio::segmenter::Segment;
use crate::defaults;
use crate::error::ProviderError;
use crate::pipeline::types::SegmentResult;
use crate::stt::provider::{ProviderTranscript, SpeechProvider, TranscriptionOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Confidence assumed when the provider reports none.
pub const DEFAULT_CONFIDENCE: f32 = 1.0;

/// Adapter that sends one segment to the provider and turns the answer into
/// a [`SegmentResult`].
///
/// Performs exactly one provider call per invocation. Failures come back as
/// data; nothing here returns `Err` to the caller.
#[derive(Clone)]
pub struct SegmentTranscriber {
    provider: Arc<dyn SpeechProvider>,
    options: TranscriptionOptions,
    timeout: Duration,
    max_segment_bytes: u64,
}

impl SegmentTranscriber {
    pub fn new(provider: Arc<dyn SpeechProvider>, options: TranscriptionOptions) -> Self {
        Self {
            provider,
            options,
            timeout: Duration::from_secs(defaults::SEGMENT_TIMEOUT_SECS),
            max_segment_bytes: defaults::MAX_SEGMENT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_segment_bytes(mut self, max_segment_bytes: u64) -> Self {
        self.max_segment_bytes = max_segment_bytes;
        self
    }

    pub fn options(&self) -> &TranscriptionOptions {
        &self.options
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Transcribe one segment.
    pub async fn transcribe(&self, segment: &Segment) -> SegmentResult {
        let outcome = self.call(segment).await;
        Self::to_result(segment, outcome)
    }

    /// One bounded provider call, without converting the outcome.
    ///
    /// Segments over the ceiling are refused locally so an oversized upload
    /// never reaches the provider.
    pub async fn call(&self, segment: &Segment) -> Result<ProviderTranscript, ProviderError> {
        if segment.len() > self.max_segment_bytes {
            return Err(ProviderError::TooLarge {
                size: segment.len(),
                ceiling: self.max_segment_bytes,
            });
        }

        let file_name = segment.file_name();
        debug!(
            segment = segment.index,
            bytes = segment.len(),
            provider = self.provider.name(),
            "transcribing segment"
        );
        let call = self.provider.transcribe(
            &segment.bytes,
            &file_name,
            segment.format.mime_type(),
            &self.options,
        );

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }

    /// Fold a provider outcome into the segment's result.
    ///
    /// Missing duration falls back to the segment's own estimate, missing
    /// confidence to [`DEFAULT_CONFIDENCE`].
    pub fn to_result(
        segment: &Segment,
        outcome: Result<ProviderTranscript, ProviderError>,
    ) -> SegmentResult {
        match outcome {
            Ok(transcript) => {
                let duration = transcript
                    .duration
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .or_else(|| segment.duration.map(|d| d.as_secs_f64()))
                    .unwrap_or(0.0);
                let confidence = transcript
                    .confidence
                    .filter(|c| c.is_finite())
                    .map(|c| c.clamp(0.0, 1.0))
                    .unwrap_or(DEFAULT_CONFIDENCE);
                SegmentResult::success(segment.index, transcript.text, duration, confidence)
            }
            Err(error) => SegmentResult::failure(segment.index, error.to_string()),
        }
    }
}

impl std::fmt::Debug for SegmentTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentTranscriber")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .field("max_segment_bytes", &self.max_segment_bytes)
            .finish()
    }
}
