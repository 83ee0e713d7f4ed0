//! Speech-to-text provider seam.
//!
//! [`SpeechProvider`] is the external capability; [`SegmentTranscriber`]
//! adapts it to one call per segment with a bounded timeout.

#[cfg(feature = "http")]
pub mod http;
pub mod mock;
pub mod provider;
pub mod transcriber;

#[cfg(feature = "http")]
pub use http::HttpProvider;
pub use mock::MockProvider;
pub use provider::{ProviderTranscript, SpeechProvider, TranscriptionOptions};
pub use transcriber::SegmentTranscriber;
