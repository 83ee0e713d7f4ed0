use crate::audio::asset::AudioAsset;

/// Decides whether an asset must be split to fit the provider ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGate {
    ceiling: u64,
}

impl SizeGate {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// An asset exactly at the ceiling still goes through in one piece.
    pub fn needs_splitting(&self, asset: &AudioAsset) -> bool {
        asset.len() > self.ceiling
    }
}
