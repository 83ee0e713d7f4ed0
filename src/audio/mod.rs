//! Audio intake: format validation, size gating and segmentation.
//!
//! Everything here is synchronous and pure; nothing touches the network.

pub mod asset;
pub mod format;
pub mod mp3;
pub mod segmenter;
pub mod size_gate;
pub mod wav;

pub use asset::{AudioAsset, format_size};
pub use format::{AudioFormat, FormatValidator};
pub use segmenter::{Segment, split};
pub use size_gate::SizeGate;
