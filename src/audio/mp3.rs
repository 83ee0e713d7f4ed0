//! MPEG audio frame walking and splitting.
//!
//! Every MPEG audio frame decodes on its own, so a stream can be cut between
//! any two frames without re-encoding. ID3v2 tags at the front and an ID3v1
//! trailer are skipped; they carry no audio.

use crate::audio::segmenter::Piece;
use crate::error::{Result, ScribeError};
use std::ops::Range;
use std::time::Duration;
use tracing::debug;

/// How far past a sync loss to search for the next frame.
const MAX_RESYNC_BYTES: usize = 16 * 1024;

const APE_FOOTER_LEN: usize = 32;

const BITRATES_V1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATES_V1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L1: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATES_V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L1,
    L2,
    L3,
}

/// Decoded 4-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
}

impl FrameHeader {
    /// Parse a frame header. Free-format and reserved values yield `None`.
    pub fn parse(raw: [u8; 4]) -> Option<Self> {
        if raw[0] != 0xFF || raw[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (raw[1] >> 3) & 0b11 {
            0b00 => MpegVersion::V25,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (raw[1] >> 1) & 0b11 {
            0b01 => Layer::L3,
            0b10 => Layer::L2,
            0b11 => Layer::L1,
            _ => return None,
        };

        let bitrate_index = (raw[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let table = match (version, layer) {
            (MpegVersion::V1, Layer::L1) => &BITRATES_V1_L1,
            (MpegVersion::V1, Layer::L2) => &BITRATES_V1_L2,
            (MpegVersion::V1, Layer::L3) => &BITRATES_V1_L3,
            (_, Layer::L1) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };

        let rates: [u32; 3] = match version {
            MpegVersion::V1 => [44100, 48000, 32000],
            MpegVersion::V2 => [22050, 24000, 16000],
            MpegVersion::V25 => [11025, 12000, 8000],
        };
        let sample_rate = *rates.get(((raw[2] >> 2) & 0b11) as usize)?;

        Some(Self {
            version,
            layer,
            bitrate_kbps: table[bitrate_index],
            sample_rate,
            padding: (raw[2] >> 1) & 1 == 1,
        })
    }

    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (Layer::L1, _) => 384,
            (Layer::L2, _) => 1152,
            (Layer::L3, MpegVersion::V1) => 1152,
            (Layer::L3, _) => 576,
        }
    }

    /// Total frame length in bytes, header included.
    pub fn frame_len(&self) -> usize {
        let bitrate = self.bitrate_kbps * 1000;
        let padding = u32::from(self.padding);
        let len = match self.layer {
            Layer::L1 => (12 * bitrate / self.sample_rate + padding) * 4,
            Layer::L2 => 144 * bitrate / self.sample_rate + padding,
            Layer::L3 => {
                let coef = if self.version == MpegVersion::V1 { 144 } else { 72 };
                coef * bitrate / self.sample_rate + padding
            }
        };
        len as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_frame() as f64 / self.sample_rate as f64)
    }
}

/// One frame located in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub range: Range<usize>,
    pub duration: Duration,
}

fn mp3_error(message: String) -> ScribeError {
    ScribeError::Segmentation {
        format: "mp3".to_string(),
        message,
    }
}

/// Byte range holding audio frames, with ID3 and APEv2 tags excluded.
pub fn audio_region(bytes: &[u8]) -> Range<usize> {
    let mut start = 0;
    if bytes.len() >= 10 && &bytes[..3] == b"ID3" {
        // Tag size is syncsafe: 7 significant bits per byte
        let size = bytes[6..10]
            .iter()
            .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7F) as usize);
        let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
        start = (10 + size + footer).min(bytes.len());
    }

    let mut end = bytes.len();
    if end >= start + 128 && &bytes[end - 128..end - 125] == b"TAG" {
        end -= 128;
    }

    // APEv2 footer: preamble, version, tag size (items + footer), item count, flags
    if end >= start + APE_FOOTER_LEN && &bytes[end - APE_FOOTER_LEN..end - 24] == b"APETAGEX" {
        let footer = &bytes[end - APE_FOOTER_LEN..end];
        let size = u32::from_le_bytes([footer[12], footer[13], footer[14], footer[15]]) as usize;
        let flags = u32::from_le_bytes([footer[20], footer[21], footer[22], footer[23]]);
        let header = if flags & (1 << 31) != 0 { APE_FOOTER_LEN } else { 0 };
        let tag_len = size.saturating_add(header).max(APE_FOOTER_LEN);
        end -= tag_len.min(end - start);
    }
    start..end
}

fn header_at(bytes: &[u8], pos: usize, end: usize) -> Option<FrameHeader> {
    if pos.checked_add(4)? > end {
        return None;
    }
    bytes
        .get(pos..pos + 4)?
        .try_into()
        .ok()
        .and_then(FrameHeader::parse)
}

/// A header at `pos` whose successor also parses, or that runs to `end`.
fn confirmed_header_at(bytes: &[u8], pos: usize, end: usize) -> Option<FrameHeader> {
    let header = header_at(bytes, pos, end)?;
    let next = pos + header.frame_len();
    if next + 4 > end || header_at(bytes, next, end).is_some() {
        Some(header)
    } else {
        None
    }
}

/// First confirmed frame within `MAX_RESYNC_BYTES` of `from`.
fn resync(bytes: &[u8], from: usize, end: usize) -> Option<(usize, FrameHeader)> {
    let limit = end.min(from.saturating_add(MAX_RESYNC_BYTES));
    (from..limit).find_map(|pos| confirmed_header_at(bytes, pos, end).map(|h| (pos, h)))
}

/// Walk every frame in the stream.
///
/// The first frame, and any frame found after stray bytes, must be followed
/// by another valid header. Stray bytes between frames are folded into the
/// preceding frame so ranges stay contiguous; a short unparsable tail is
/// dropped. Losing sync for longer than `MAX_RESYNC_BYTES` is a hard error.
/// A truncated final frame is kept as-is.
pub fn frames(bytes: &[u8]) -> Result<Vec<Frame>> {
    let region = audio_region(bytes);
    let mut frames: Vec<Frame> = Vec::new();
    let mut pos = region.start;

    while pos < region.end {
        let in_sync = header_at(bytes, pos, region.end).filter(|_| !frames.is_empty());
        let header = match in_sync {
            Some(header) => header,
            None => match resync(bytes, pos, region.end) {
                Some((sync, header)) => {
                    if sync > pos {
                        debug!(offset = pos, skipped = sync - pos, "resynchronized MPEG frames");
                        if let Some(last) = frames.last_mut() {
                            last.range.end = sync;
                        }
                    }
                    pos = sync;
                    header
                }
                None if !frames.is_empty() && region.end - pos <= MAX_RESYNC_BYTES => {
                    debug!(
                        offset = pos,
                        dropped = region.end - pos,
                        "dropping trailing non-audio bytes"
                    );
                    break;
                }
                None => {
                    return Err(mp3_error(format!(
                        "lost frame sync at byte {} (corrupt or free-format stream)",
                        pos
                    )));
                }
            },
        };

        let end = (pos + header.frame_len()).min(region.end);
        frames.push(Frame {
            range: pos..end,
            duration: header.duration(),
        });
        pos = end;
    }

    Ok(frames)
}

/// Playback length: the sum of all frame durations.
pub fn duration(bytes: &[u8]) -> Result<Duration> {
    let frames = frames(bytes)?;
    if frames.is_empty() {
        return Err(mp3_error("no MPEG audio frames".to_string()));
    }
    Ok(frames.iter().map(|f| f.duration).sum())
}

/// Cut an MP3 stream between frames into pieces of at most `max` bytes.
///
/// Starts from the fewest pieces the total size allows and aims each piece at
/// an equal share, adding a piece whenever frame granularity makes the
/// current count impossible.
pub(crate) fn split(bytes: &[u8], max: usize) -> Result<Vec<Piece>> {
    let frames = frames(bytes)?;
    if frames.is_empty() {
        return Err(mp3_error("no MPEG audio frames".to_string()));
    }

    let largest = frames.iter().map(|f| f.range.len()).max().unwrap_or(0);
    if largest > max {
        return Err(mp3_error(format!(
            "a single {} byte frame exceeds the {} byte ceiling",
            largest, max
        )));
    }

    let total: usize = frames.iter().map(|f| f.range.len()).sum();
    let mut count = total.div_ceil(max).max(1);
    let groups = loop {
        let groups = pack(&frames, total.div_ceil(count), max);
        if groups.len() <= count {
            break groups;
        }
        count += 1;
    };

    Ok(groups
        .into_iter()
        .map(|group| {
            let start = group[0].range.start;
            let end = group[group.len() - 1].range.end;
            Piece {
                byte_range: start..end,
                duration: Some(group.iter().map(|f| f.duration).sum()),
                bytes: bytes[start..end].to_vec(),
            }
        })
        .collect())
}

/// Greedy grouping: close a group once it reaches `target` bytes or the next
/// frame would push it past `max`.
fn pack(frames: &[Frame], target: usize, max: usize) -> Vec<&[Frame]> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut size = 0;

    for (i, frame) in frames.iter().enumerate() {
        let len = frame.range.len();
        if i > start && (size >= target || size + len > max) {
            groups.push(&frames[start..i]);
            start = i;
            size = 0;
        }
        size += len;
    }
    groups.push(&frames[start..]);
    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, no padding: 417-byte frames.
    pub(crate) const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
    pub(crate) const FRAME_LEN: usize = 417;

    pub(crate) fn make_mp3(frames: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(frames * FRAME_LEN);
        for i in 0..frames {
            data.extend_from_slice(&FRAME_HEADER);
            data.extend(std::iter::repeat_n((i % 251) as u8, FRAME_LEN - 4));
        }
        data
    }

    #[test]
    fn parses_reference_header() {
        let header = FrameHeader::parse(FRAME_HEADER).unwrap();
        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, Layer::L3);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44100);
        assert!(!header.padding);
        assert_eq!(header.frame_len(), FRAME_LEN);
        assert_eq!(header.samples_per_frame(), 1152);
    }

    #[test]
    fn padding_adds_a_byte() {
        let header = FrameHeader::parse([0xFF, 0xFB, 0x92, 0x00]).unwrap();
        assert!(header.padding);
        assert_eq!(header.frame_len(), FRAME_LEN + 1);
    }

    #[test]
    fn mpeg2_layer3_uses_half_frames() {
        // MPEG-2 L3, 64 kbps, 22.05 kHz
        let header = FrameHeader::parse([0xFF, 0xF3, 0x80, 0x00]).unwrap();
        assert_eq!(header.version, MpegVersion::V2);
        assert_eq!(header.bitrate_kbps, 64);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.samples_per_frame(), 576);
        assert_eq!(header.frame_len(), 72 * 64000 / 22050);
    }

    #[test]
    fn rejects_free_format_and_reserved_values() {
        assert!(FrameHeader::parse([0xFF, 0xFB, 0x00, 0x00]).is_none());
        assert!(FrameHeader::parse([0xFF, 0xFB, 0xF0, 0x00]).is_none());
        assert!(FrameHeader::parse([0xFF, 0xFB, 0x9C, 0x00]).is_none());
        assert!(FrameHeader::parse([0xFF, 0xE9, 0x90, 0x00]).is_none());
        assert!(FrameHeader::parse([0x00, 0xFB, 0x90, 0x00]).is_none());
    }

    #[test]
    fn walks_all_frames() {
        let data = make_mp3(10);
        let frames = frames(&data).unwrap();
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[3].range, 3 * FRAME_LEN..4 * FRAME_LEN);
    }

    #[test]
    fn skips_id3_tags() {
        let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x0A".to_vec();
        data.extend_from_slice(&[0u8; 10]);
        data.extend(make_mp3(3));
        let mut trailer = b"TAG".to_vec();
        trailer.resize(128, b' ');
        data.extend(trailer);

        let region = audio_region(&data);
        assert_eq!(region, 20..20 + 3 * FRAME_LEN);
        assert_eq!(frames(&data).unwrap().len(), 3);
    }

    #[test]
    fn duration_sums_frames() {
        let data = make_mp3(100);
        let expected = 100.0 * 1152.0 / 44100.0;
        assert!((duration(&data).unwrap().as_secs_f64() - expected).abs() < 1e-6);
    }

    #[test]
    fn split_is_balanced_on_frame_boundaries() {
        let data = make_mp3(100);
        let pieces = split(&data, 5_000).unwrap();

        assert_eq!(pieces.len(), 10);
        for piece in &pieces {
            assert_eq!(piece.bytes.len(), 10 * FRAME_LEN);
            assert_eq!(&piece.bytes[..4], &FRAME_HEADER);
        }
        let rejoined: Vec<u8> = pieces.iter().flat_map(|p| p.bytes.clone()).collect();
        assert_eq!(rejoined, data);
    }

    #[test]
    fn frame_larger_than_ceiling_is_rejected() {
        let data = make_mp3(4);
        let err = split(&data, FRAME_LEN - 1).unwrap_err();
        assert!(err.is_segmentation());
        assert!(err.to_string().contains("frame"));
    }

    #[test]
    fn junk_between_frames_is_folded_into_previous_frame() {
        let mut data = make_mp3(2);
        data.extend_from_slice(&[0x12; 30]);
        data.extend(make_mp3(2));

        let frames = frames(&data).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1].range, FRAME_LEN..2 * FRAME_LEN + 30);
        assert_eq!(frames[2].range.start, 2 * FRAME_LEN + 30);
    }

    #[test]
    fn long_sync_loss_is_rejected() {
        let mut data = make_mp3(2);
        data.extend(std::iter::repeat_n(0x12u8, MAX_RESYNC_BYTES + 100));
        data.extend(make_mp3(2));
        let err = frames(&data).unwrap_err();
        assert!(err.to_string().contains("lost frame sync at byte 834"));
    }

    #[test]
    fn non_mpeg_bytes_are_rejected() {
        let err = split(&[0x12; 10_000], 5_000).unwrap_err();
        assert!(err.to_string().contains("lost frame sync at byte 0"));
    }

    #[test]
    fn short_tail_after_last_frame_is_dropped() {
        let mut data = make_mp3(100);
        data.extend_from_slice(&[0, 0]);

        let pieces = split(&data, 5_000).unwrap();
        assert_eq!(pieces.len(), 10);
        assert_eq!(pieces[9].byte_range.end, 100 * FRAME_LEN);
    }

    #[test]
    fn ape_tag_is_stripped() {
        let mut data = make_mp3(100);
        let mut tag = vec![0x41u8; 32];
        tag.extend_from_slice(b"APETAGEX");
        tag.extend_from_slice(&2000u32.to_le_bytes());
        tag.extend_from_slice(&64u32.to_le_bytes());
        tag.extend_from_slice(&1u32.to_le_bytes());
        tag.extend_from_slice(&0u32.to_le_bytes());
        tag.extend_from_slice(&[0u8; 8]);
        data.extend(tag);

        assert_eq!(audio_region(&data), 0..100 * FRAME_LEN);
        let pieces = split(&data, 5_000).unwrap();
        assert_eq!(pieces.len(), 10);
        assert_eq!(pieces[9].byte_range.end, 100 * FRAME_LEN);
    }

    #[test]
    fn unparsed_trailer_is_dropped() {
        let mut data = make_mp3(100);
        let mut trailer = b"APETAGEX".to_vec();
        trailer.resize(64, 0);
        data.extend(trailer);

        let pieces = split(&data, 5_000).unwrap();
        assert_eq!(pieces.len(), 10);
        assert_eq!(pieces[9].byte_range.end, 100 * FRAME_LEN);
    }

    #[test]
    fn padding_after_id3_is_skipped() {
        let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x0A".to_vec();
        data.extend_from_slice(&[0u8; 10]);
        data.extend_from_slice(&[0u8; 16]);
        data.extend(make_mp3(100));

        let frames = frames(&data).unwrap();
        assert_eq!(frames.len(), 100);
        assert_eq!(frames[0].range.start, 36);
        assert_eq!(split(&data, 5_000).unwrap().len(), 10);
    }

    #[test]
    fn unconfirmed_sync_word_is_skipped() {
        let mut data = vec![0x12u8; 10];
        data.extend_from_slice(&FRAME_HEADER);
        data.extend_from_slice(&[0x12; 20]);
        data.extend(make_mp3(3));

        let frames = frames(&data).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].range.start, 34);
    }

    #[test]
    fn truncated_last_frame_is_kept() {
        let mut data = make_mp3(3);
        data.truncate(2 * FRAME_LEN + 100);
        let frames = frames(&data).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].range.end, data.len());
    }
}
