//! WAV payload splitting.
//!
//! The RIFF header is parsed with hound, the PCM payload is cut on
//! block-align boundaries, and each piece gets a fresh canonical 44-byte
//! header so the provider can decode it on its own.

use crate::audio::segmenter::Piece;
use crate::error::{Result, ScribeError};
use std::io::Cursor;
use std::time::Duration;

/// Size of the canonical RIFF/WAVE header written in front of each piece.
pub const HEADER_LEN: usize = 44;

/// Where the samples live inside a WAV file, and how they are laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct WavLayout {
    pub spec: hound::WavSpec,
    /// Offset of the first sample byte.
    pub data_offset: usize,
    /// Payload length, truncated to whole sample frames.
    pub data_len: usize,
    /// Bytes per sample frame (all channels).
    pub block_align: usize,
}

impl WavLayout {
    pub fn total_blocks(&self) -> usize {
        self.data_len / self.block_align
    }

    pub fn blocks_duration(&self, blocks: usize) -> Duration {
        Duration::from_secs_f64(blocks as f64 / self.spec.sample_rate as f64)
    }
}

fn wav_error(message: String) -> ScribeError {
    ScribeError::Segmentation {
        format: "wav".to_string(),
        message,
    }
}

/// Parse the header and locate the sample payload.
pub fn parse_layout(bytes: &[u8]) -> Result<WavLayout> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| wav_error(format!("Failed to parse WAV header: {}", e)))?;
    let spec = reader.spec();
    // hound stops right after the `data` chunk header
    let data_offset = usize::try_from(reader.into_inner().position())
        .map_err(|_| wav_error("data offset out of range".to_string()))?;

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(wav_error(format!(
            "invalid format: {} channel(s) at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let available = bytes.len().saturating_sub(data_offset);
    let declared = data_offset
        .checked_sub(4)
        .and_then(|size_at| bytes.get(size_at..data_offset))
        .and_then(|raw| raw.try_into().ok())
        .map(|raw: [u8; 4]| u32::from_le_bytes(raw) as usize)
        .unwrap_or(available);
    // Streaming recorders leave the size at 0 or 0xFFFFFFFF
    let data_len = if declared == 0 || declared > available {
        available
    } else {
        declared
    };

    let bytes_per_sample = (spec.bits_per_sample as usize).div_ceil(8);
    let block_align = bytes_per_sample * spec.channels as usize;
    if block_align == 0 {
        return Err(wav_error("zero-width samples".to_string()));
    }

    Ok(WavLayout {
        spec,
        data_offset,
        data_len: data_len - data_len % block_align,
        block_align,
    })
}

/// Playback length derived from the header.
pub fn duration(bytes: &[u8]) -> Result<Duration> {
    let layout = parse_layout(bytes)?;
    Ok(layout.blocks_duration(layout.total_blocks()))
}

/// Canonical 44-byte PCM (or IEEE float) header for `data_len` payload bytes.
///
/// Fails when a field does not fit its RIFF width, which only a crafted
/// source header can cause.
pub fn canonical_header(layout: &WavLayout, data_len: usize) -> Result<Vec<u8>> {
    let spec = &layout.spec;
    let format_tag: u16 = match spec.sample_format {
        hound::SampleFormat::Int => 1,
        hound::SampleFormat::Float => 3,
    };
    let block_align = u16::try_from(layout.block_align)
        .map_err(|_| wav_error(format!("block align of {} bytes is too wide", layout.block_align)))?;
    let container_bits = (block_align / spec.channels)
        .checked_mul(8)
        .ok_or_else(|| wav_error(format!("{}-byte samples are too wide", block_align / spec.channels)))?;
    let byte_rate = spec
        .sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| {
            wav_error(format!(
                "byte rate overflows at {} Hz x {} bytes",
                spec.sample_rate, block_align
            ))
        })?;
    let (data_len, riff_len) = u32::try_from(data_len)
        .ok()
        .and_then(|len| Some((len, len.checked_add(36)?)))
        .ok_or_else(|| wav_error(format!("payload of {} bytes exceeds RIFF limits", data_len)))?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&riff_len.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&format_tag.to_le_bytes());
    header.extend_from_slice(&spec.channels.to_le_bytes());
    header.extend_from_slice(&spec.sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&container_bits.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_len.to_le_bytes());
    Ok(header)
}

/// Cut a WAV file into near-equal pieces of at most `max` bytes each.
///
/// Uses the fewest pieces that fit, spreading sample frames evenly so no
/// trailing piece is left nearly empty.
pub(crate) fn split(bytes: &[u8], max: usize) -> Result<Vec<Piece>> {
    let layout = parse_layout(bytes)?;

    if max < HEADER_LEN + layout.block_align {
        return Err(wav_error(format!(
            "ceiling of {} bytes cannot hold a header and one sample frame",
            max
        )));
    }
    if u32::try_from(max).is_err() {
        return Err(wav_error(format!(
            "ceiling of {} bytes exceeds the RIFF size limit",
            max
        )));
    }

    let total_blocks = layout.total_blocks();
    if total_blocks == 0 {
        return Err(wav_error("no audio samples".to_string()));
    }

    let blocks_cap = (max - HEADER_LEN) / layout.block_align;
    let count = total_blocks.div_ceil(blocks_cap);
    let base = total_blocks / count;
    let extra = total_blocks % count;

    let mut pieces = Vec::with_capacity(count);
    let mut start_block = 0;
    for i in 0..count {
        let blocks = base + usize::from(i < extra);
        let start = layout.data_offset + start_block * layout.block_align;
        let end = start + blocks * layout.block_align;

        let mut piece_bytes = canonical_header(&layout, end - start)?;
        piece_bytes.extend_from_slice(&bytes[start..end]);

        pieces.push(Piece {
            byte_range: start..end,
            duration: Some(layout.blocks_duration(blocks)),
            bytes: piece_bytes,
        });
        start_block += blocks;
    }

    Ok(pieces)
}
