//! Transcription pipeline for one recording.
//!
//! `Validating -> (Direct | Splitting) -> Transcribing -> Aggregating -> Done | Failed`
//!
//! Only validation and segmentation abort early. Once transcription starts,
//! every segment resolves to a result and aggregation always runs. A run
//! ends in `Failed` after that point only when no segment succeeded; a
//! cancelled run that transcribed something is a partial success.

use crate::audio::asset::AudioAsset;
use crate::audio::format::FormatValidator;
use crate::audio::segmenter::{self, Segment};
use crate::audio::size_gate::SizeGate;
use crate::config::Config;
use crate::defaults;
use crate::error::ScribeError;
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::types::{PipelineEvent, PipelineState, SegmentResult, TranscriptionOutcome};
use crate::stt::provider::{SpeechProvider, TranscriptionOptions};
use crate::stt::transcriber::SegmentTranscriber;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error recorded for segments never sent because the run was cancelled.
pub const CANCELLED_BEFORE: &str = "cancelled before transcription";

/// Error recorded for a segment whose in-flight call was abandoned.
pub const CANCELLED_DURING: &str = "cancelled during transcription";

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Provider payload ceiling in bytes
    pub max_segment_bytes: u64,
    /// Accepted declared formats
    pub validator: FormatValidator,
    /// Per-call provider timeout
    pub timeout: Duration,
    /// Segments in flight at once (1 = strictly sequential)
    pub concurrency: usize,
    /// Backoff for transient provider failures
    pub retry: RetryPolicy,
    /// Consecutive blank lines kept in the merged transcript
    pub max_blank_lines: usize,
    /// Optional progress channel
    pub event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: defaults::MAX_SEGMENT_BYTES,
            validator: FormatValidator::default(),
            timeout: Duration::from_secs(defaults::SEGMENT_TIMEOUT_SECS),
            concurrency: defaults::CONCURRENCY,
            retry: RetryPolicy::default(),
            max_blank_lines: defaults::MAX_BLANK_LINES,
            event_tx: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_segment_bytes: config.limits.max_segment_bytes,
            validator: config.format_validator(),
            timeout: config.provider.timeout(),
            concurrency: config.transcription.concurrency.max(1),
            retry: RetryPolicy::from_config(&config.retry),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }
}

/// Terminal failure of a run.
///
/// `outcome` is present when transcription was attempted, so callers can
/// still report per-segment errors.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: ScribeError,
    pub outcome: Option<TranscriptionOutcome>,
}

impl PipelineFailure {
    fn early(error: ScribeError) -> Self {
        Self {
            error,
            outcome: None,
        }
    }
}

pub type PipelineResult = std::result::Result<TranscriptionOutcome, PipelineFailure>;

/// Runs recordings through validation, segmentation, transcription and
/// aggregation. Holds no per-request state; one instance can serve many runs.
pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn SpeechProvider>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, provider: Arc<dyn SpeechProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transcribe `asset` to completion.
    pub async fn run(&self, asset: &AudioAsset, options: &TranscriptionOptions) -> PipelineResult {
        self.run_with_cancel(asset, options, &CancellationToken::new())
            .await
    }

    /// Transcribe `asset`, stopping further provider calls once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        asset: &AudioAsset,
        options: &TranscriptionOptions,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        let result = self.drive(asset, options, cancel).await;
        match &result {
            Ok(outcome) => {
                self.enter(PipelineState::Done);
                info!(
                    segments = outcome.segments,
                    failed = outcome.errors.len(),
                    duration_secs = outcome.total_duration,
                    "transcription finished"
                );
            }
            Err(failure) => {
                self.enter(PipelineState::Failed);
                warn!(error = %failure.error, "transcription failed");
            }
        }
        result
    }

    async fn drive(
        &self,
        asset: &AudioAsset,
        options: &TranscriptionOptions,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        self.enter(PipelineState::Validating);
        let format = self
            .config
            .validator
            .validate(asset.mime_type())
            .map_err(PipelineFailure::early)?;
        if asset.is_empty() {
            return Err(PipelineFailure::early(ScribeError::EmptyAsset));
        }

        let segmented = SizeGate::new(self.config.max_segment_bytes).needs_splitting(asset);
        self.enter(if segmented {
            PipelineState::Splitting
        } else {
            PipelineState::Direct
        });
        let segments = segmenter::split(asset, self.config.max_segment_bytes)
            .map_err(PipelineFailure::early)?;
        info!(
            format = %format,
            size = %asset.human_size(),
            segments = segments.len(),
            segmented,
            "recording prepared"
        );

        self.enter(PipelineState::Transcribing);
        let transcriber = SegmentTranscriber::new(self.provider.clone(), options.clone())
            .with_timeout(self.config.timeout)
            .with_max_segment_bytes(self.config.max_segment_bytes);
        let results = self.transcribe_all(&transcriber, &segments, cancel).await;
        check_complete(&results, segments.len()).map_err(PipelineFailure::early)?;

        self.enter(PipelineState::Aggregating);
        let outcome = Aggregator::new(self.config.max_blank_lines).combine(results, segmented);

        if outcome.is_total_failure() {
            let error = if cancel.is_cancelled() {
                ScribeError::Cancelled
            } else {
                ScribeError::AllSegmentsFailed {
                    segments: outcome.segments,
                }
            };
            return Err(PipelineFailure {
                error,
                outcome: Some(outcome),
            });
        }
        if cancel.is_cancelled() {
            info!(
                failed = outcome.errors.len(),
                "cancelled; keeping the segments already transcribed"
            );
        }
        Ok(outcome)
    }

    /// One result per segment, in index order.
    ///
    /// `buffered` starts at most `concurrency` calls and yields them in the
    /// order they were started, so arrival order never leaks into the result.
    async fn transcribe_all(
        &self,
        transcriber: &SegmentTranscriber,
        segments: &[Segment],
        cancel: &CancellationToken,
    ) -> Vec<SegmentResult> {
        let total = segments.len();
        stream::iter(
            segments
                .iter()
                .map(|segment| self.transcribe_segment(transcriber, segment, total, cancel)),
        )
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await
    }

    async fn transcribe_segment(
        &self,
        transcriber: &SegmentTranscriber,
        segment: &Segment,
        total: usize,
        cancel: &CancellationToken,
    ) -> SegmentResult {
        if cancel.is_cancelled() {
            debug!(segment = segment.index, "skipping segment after cancellation");
            return SegmentResult::failure(segment.index, CANCELLED_BEFORE);
        }
        self.emit(PipelineEvent::SegmentStarted {
            index: segment.index,
            total,
        });

        let mut retries = 0;
        let result = loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break SegmentResult::failure(segment.index, CANCELLED_DURING),
                outcome = transcriber.call(segment) => outcome,
            };

            let error = match outcome {
                Ok(transcript) => break SegmentTranscriber::to_result(segment, Ok(transcript)),
                Err(error) => error,
            };
            let Some(delay) = self.config.retry.should_retry(retries, &error) else {
                break SegmentTranscriber::to_result(segment, Err(error));
            };

            retries += 1;
            warn!(
                segment = segment.index,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying segment"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break SegmentResult::failure(segment.index, CANCELLED_DURING),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        if let Some(error) = &result.error {
            warn!(segment = segment.index, error = %error, "segment failed");
        }
        self.emit(PipelineEvent::SegmentFinished {
            index: segment.index,
            total,
            success: result.is_success(),
            attempts: retries + 1,
        });
        result
    }

    fn enter(&self, state: PipelineState) {
        debug!(state = %state, "pipeline state");
        self.emit(PipelineEvent::StateChanged(state));
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.config.event_tx {
            // A dropped receiver only means nobody is watching progress
            tx.send(event).ok();
        }
    }
}

/// Exactly one result per index `0..expected`, already in order.
fn check_complete(results: &[SegmentResult], expected: usize) -> crate::error::Result<()> {
    if results.len() != expected {
        return Err(ScribeError::IncompleteResults {
            message: format!("expected {} results, got {}", expected, results.len()),
        });
    }
    for (position, result) in results.iter().enumerate() {
        if result.index != position {
            return Err(ScribeError::IncompleteResults {
                message: format!(
                    "result at position {} belongs to segment {}",
                    position, result.index
                ),
            });
        }
    }
    Ok(())
}
