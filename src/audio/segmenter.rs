//! Cuts an oversized recording into ordered, independently decodable segments.
//!
//! Splitting is format-aware: WAV payloads are cut on sample-frame boundaries
//! and re-headered, MP3 streams are cut between MPEG frames. Containers that
//! cannot be cut without re-encoding (WebM, Ogg, FLAC, MP4) are rejected with
//! a segmentation error instead of being sliced blindly.

use crate::audio::asset::AudioAsset;
use crate::audio::format::AudioFormat;
use crate::audio::{mp3, wav};
use crate::error::{Result, ScribeError};
use std::ops::Range;
use std::time::Duration;
use tracing::debug;

/// One provider-sized slice of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the recording, starting at 0.
    pub index: usize,
    /// Range of the original asset's bytes this segment carries.
    pub byte_range: Range<usize>,
    /// Approximate playback length, when it can be derived.
    pub duration: Option<Duration>,
    /// Upload-ready bytes (may include a synthesized container header).
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used for the multipart upload.
    pub fn file_name(&self) -> String {
        format!("segment-{:03}.{}", self.index, self.format.extension())
    }
}

/// Splitter output before indices are assigned.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Piece {
    pub byte_range: Range<usize>,
    pub duration: Option<Duration>,
    pub bytes: Vec<u8>,
}

/// Split `asset` into segments no larger than `max_segment_bytes`.
///
/// An asset that already fits comes back as a single segment with its bytes
/// untouched. Concatenating the segments' `byte_range`s in index order covers
/// the recording's audio payload without gaps or overlap.
pub fn split(asset: &AudioAsset, max_segment_bytes: u64) -> Result<Vec<Segment>> {
    if asset.is_empty() {
        return Err(ScribeError::EmptyAsset);
    }
    let format =
        AudioFormat::from_mime(asset.mime_type()).ok_or_else(|| ScribeError::Segmentation {
            format: asset.mime_type().to_string(),
            message: "unknown container".to_string(),
        })?;

    if asset.len() <= max_segment_bytes {
        return Ok(vec![whole(asset, format)]);
    }

    let max = usize::try_from(max_segment_bytes).unwrap_or(usize::MAX);
    let pieces = match format {
        AudioFormat::Wav => wav::split(asset.bytes(), max)?,
        AudioFormat::Mpeg => mp3::split(asset.bytes(), max)?,
        other => {
            return Err(ScribeError::Segmentation {
                format: other.name().to_string(),
                message: "container cannot be cut on byte boundaries without re-encoding"
                    .to_string(),
            });
        }
    };
    check_pieces(&pieces, max, format)?;

    debug!(
        format = %format,
        segments = pieces.len(),
        asset_bytes = asset.len(),
        max_segment_bytes,
        "split recording"
    );

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Segment {
            index,
            byte_range: piece.byte_range,
            duration: piece.duration,
            bytes: piece.bytes,
            format,
        })
        .collect())
}

/// Best-effort playback length of a complete recording.
pub fn estimate_duration(format: AudioFormat, bytes: &[u8]) -> Option<Duration> {
    match format {
        AudioFormat::Wav => wav::duration(bytes).ok(),
        AudioFormat::Mpeg => mp3::duration(bytes).ok(),
        _ => None,
    }
}

fn whole(asset: &AudioAsset, format: AudioFormat) -> Segment {
    Segment {
        index: 0,
        byte_range: 0..asset.bytes().len(),
        duration: asset
            .duration()
            .or_else(|| estimate_duration(format, asset.bytes())),
        bytes: asset.bytes().to_vec(),
        format,
    }
}

fn check_pieces(pieces: &[Piece], max: usize, format: AudioFormat) -> Result<()> {
    let degenerate = |message: String| ScribeError::Segmentation {
        format: format.name().to_string(),
        message,
    };

    if pieces.is_empty() {
        return Err(degenerate("no audio payload found".to_string()));
    }
    let mut prev_end = pieces[0].byte_range.start;
    for (index, piece) in pieces.iter().enumerate() {
        if piece.bytes.is_empty() || piece.byte_range.is_empty() {
            return Err(degenerate(format!("segment {} is empty", index)));
        }
        if piece.bytes.len() > max {
            return Err(degenerate(format!(
                "segment {} is {} bytes, over the {} byte ceiling",
                index,
                piece.bytes.len(),
                max
            )));
        }
        if piece.byte_range.start != prev_end {
            return Err(degenerate(format!(
                "segment {} does not start where segment {} ended",
                index,
                index.saturating_sub(1)
            )));
        }
        prev_end = piece.byte_range.end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mp3::tests::make_mp3;
    use crate::audio::wav::tests::make_wav_data;

    #[test]
    fn small_asset_is_a_single_untouched_segment() {
        let data = make_wav_data(16000, 1, &[1i16; 1600]);
        let asset = AudioAsset::new(data.clone(), "audio/wav");

        let segments = split(&asset, data.len() as u64).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].bytes, data);
        assert_eq!(segments[0].byte_range, 0..data.len());
        assert_eq!(segments[0].duration, Some(Duration::from_millis(100)));
    }

    #[test]
    fn known_duration_wins_over_estimate() {
        let data = make_wav_data(16000, 1, &[1i16; 1600]);
        let asset = AudioAsset::new(data, "audio/wav").with_duration(Duration::from_secs(9));

        let segments = split(&asset, u64::MAX).unwrap();
        assert_eq!(segments[0].duration, Some(Duration::from_secs(9)));
    }

    #[test]
    fn empty_asset_is_rejected() {
        let asset = AudioAsset::new(Vec::new(), "audio/wav");
        assert!(matches!(split(&asset, 100), Err(ScribeError::EmptyAsset)));
    }

    #[test]
    fn oversized_webm_is_a_segmentation_error() {
        let asset = AudioAsset::new(vec![0u8; 1000], "audio/webm");
        let err = split(&asset, 100).unwrap_err();
        assert!(err.is_segmentation());
        assert!(err.to_string().contains("webm"));
    }

    #[test]
    fn small_webm_passes_through() {
        let asset = AudioAsset::new(vec![7u8; 50], "audio/webm");
        let segments = split(&asset, 100).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration, None);
    }

    #[test]
    fn wav_segments_are_ordered_and_within_ceiling() {
        let samples: Vec<i16> = (0..10_000).map(|i| (i % 200) as i16).collect();
        let data = make_wav_data(16000, 1, &samples);
        let asset = AudioAsset::new(data, "audio/wav");

        let segments = split(&asset, 4096).unwrap();

        assert!(segments.len() > 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert!(segment.len() <= 4096);
            assert_eq!(segment.format, AudioFormat::Wav);
        }
    }

    #[test]
    fn mp3_segments_are_ordered_and_within_ceiling() {
        let data = make_mp3(100);
        let asset = AudioAsset::new(data, "audio/mpeg");

        let segments = split(&asset, 5_000).unwrap();

        assert!(segments.len() > 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert!(segment.len() <= 5_000);
            assert_eq!(segment.file_name(), format!("segment-{:03}.mp3", i));
        }
    }

    #[test]
    fn check_pieces_rejects_gaps() {
        let pieces = vec![
            Piece {
                byte_range: 0..10,
                duration: None,
                bytes: vec![0; 10],
            },
            Piece {
                byte_range: 12..20,
                duration: None,
                bytes: vec![0; 8],
            },
        ];
        assert!(check_pieces(&pieces, 100, AudioFormat::Wav).is_err());
    }

    #[test]
    fn check_pieces_rejects_oversized() {
        let pieces = vec![Piece {
            byte_range: 0..10,
            duration: None,
            bytes: vec![0; 10],
        }];
        assert!(check_pieces(&pieces, 9, AudioFormat::Wav).is_err());
    }
}
