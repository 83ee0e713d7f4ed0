//! Transcription pipeline for size-constrained providers.
//!
//! The orchestrator drives one recording through validation, splitting,
//! sequential (or bounded, order-preserving) transcription and aggregation.

pub mod aggregator;
pub mod envelope;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use aggregator::{Aggregator, normalize_whitespace};
pub use envelope::{TranscriptionRequest, TranscriptionResponse};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineFailure, PipelineResult};
pub use retry::RetryPolicy;
pub use types::{
    PipelineEvent, PipelineState, SegmentError, SegmentResult, TranscriptionOutcome,
};
