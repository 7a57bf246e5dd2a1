//! Minimal FLV muxer for recorded segments
//!
//! Recorded segments are FLV containers holding JPEG video tags (FLV video
//! codec id 1). Every JPEG is an independent keyframe, so any segment can be
//! played from its first tag — exactly the property the sliding-window
//! playlist relies on.
//!
//! # FLV File Format
//!
//! ```text
//! +============+==================+==============+==================+
//! | FLV Header | PrevTagSize0 (0) | Tag 1        | PrevTagSize1 ... |
//! | (9 bytes)  | (4 bytes)        | (11+N bytes) | (4 bytes)        |
//! +============+==================+==============+==================+
//! ```

use std::io::Write;

/// FLV file signature: "FLV" in ASCII
const FLV_SIGNATURE: [u8; 3] = [0x46, 0x4C, 0x56];

/// FLV version (always 1)
const FLV_VERSION: u8 = 0x01;

/// Type flags: bit 0 = video
const FLV_TYPE_FLAGS_VIDEO: u8 = 0x01;

/// Type flags: bit 0 = video, bit 2 = audio
const FLV_TYPE_FLAGS_AV: u8 = 0x05;

/// FLV header is always 9 bytes
const FLV_HEADER_SIZE: u32 = 9;

/// FLV tag type codes
const FLV_TAG_AUDIO: u8 = 8;
const FLV_TAG_VIDEO: u8 = 9;

/// Video tag prefix: frame type 1 (keyframe) << 4 | codec id 1 (JPEG)
const VIDEO_KEYFRAME_JPEG: u8 = 0x11;

/// Audio tag prefix: sound format 3 (linear PCM LE), 44 kHz, 16-bit, stereo
const AUDIO_PCM_HEADER: u8 = 0x3F;

/// Fixed per-tag overhead: 11-byte tag header + 4-byte PreviousTagSize
pub const TAG_OVERHEAD: usize = 15;

/// Size of the file header plus PreviousTagSize0
pub const HEADER_SIZE: usize = 13;

/// Write the FLV file header (9 bytes) plus initial PreviousTagSize0 (4 bytes)
pub fn write_header(writer: &mut impl Write, has_audio: bool) -> std::io::Result<()> {
    let type_flags = if has_audio {
        FLV_TYPE_FLAGS_AV
    } else {
        FLV_TYPE_FLAGS_VIDEO
    };

    writer.write_all(&FLV_SIGNATURE)?;
    writer.write_all(&[FLV_VERSION])?;
    writer.write_all(&[type_flags])?;
    writer.write_all(&FLV_HEADER_SIZE.to_be_bytes())?;
    writer.write_all(&0u32.to_be_bytes())?; // PreviousTagSize0 = 0
    Ok(())
}

/// Write one JPEG image as a keyframe video tag
pub fn write_video_jpeg(
    writer: &mut impl Write,
    timestamp_ms: u32,
    jpeg: &[u8],
) -> std::io::Result<()> {
    write_tag(
        writer,
        FLV_TAG_VIDEO,
        timestamp_ms,
        &[&[VIDEO_KEYFRAME_JPEG], jpeg],
    )
}

/// Write one raw audio sample as an audio tag
pub fn write_audio_raw(
    writer: &mut impl Write,
    timestamp_ms: u32,
    data: &[u8],
) -> std::io::Result<()> {
    write_tag(writer, FLV_TAG_AUDIO, timestamp_ms, &[&[AUDIO_PCM_HEADER], data])
}

/// Write an FLV tag with header, payload pieces, and trailing PreviousTagSize
///
/// Tag structure:
/// - Type (1B) + DataSize (3B BE) + Timestamp (3B + 1B ext) + StreamID (3B)
/// - Payload, followed by PreviousTagSize (4B BE) = 11 + payload length
fn write_tag(
    writer: &mut impl Write,
    tag_type: u8,
    timestamp: u32,
    payloads: &[&[u8]],
) -> std::io::Result<()> {
    let data_size: usize = payloads.iter().map(|p| p.len()).sum();
    let data_size = data_size as u32;

    // Tag type
    writer.write_all(&[tag_type])?;

    // Data size (24-bit BE)
    writer.write_all(&[
        ((data_size >> 16) & 0xFF) as u8,
        ((data_size >> 8) & 0xFF) as u8,
        (data_size & 0xFF) as u8,
    ])?;

    // Timestamp: lower 24 bits, then upper 8 bits (extension byte)
    writer.write_all(&[
        ((timestamp >> 16) & 0xFF) as u8,
        ((timestamp >> 8) & 0xFF) as u8,
        (timestamp & 0xFF) as u8,
        ((timestamp >> 24) & 0xFF) as u8,
    ])?;

    // Stream ID (always 0 in FLV files)
    writer.write_all(&[0, 0, 0])?;

    for payload in payloads {
        writer.write_all(payload)?;
    }

    // PreviousTagSize = 11 (header) + data length
    let prev_tag_size = 11 + data_size;
    writer.write_all(&prev_tag_size.to_be_bytes())?;

    Ok(())
}
