//! Timestamped media frames
//!
//! Frames are designed to be cheap to clone: `bytes::Bytes` is reference
//! counted, so handing the same frame to every viewer and to the segment
//! writer shares one allocation.

use std::time::Duration;

use bytes::Bytes;

/// Kind of media a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Video sample (JPEG-encoded for the live hub)
    Video,
    /// Audio sample
    Audio,
}

/// One encoded media sample with its presentation timestamp
///
/// The timestamp is relative to the frame source's own epoch; the core only
/// ever looks at deltas between timestamps, never at absolute values.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Video or audio
    pub kind: MediaKind,
    /// Presentation timestamp
    pub timestamp: Duration,
    /// Sample payload (JPEG bytes for video)
    pub data: Bytes,
}

impl MediaFrame {
    /// Create a video frame from a JPEG buffer
    pub fn video(timestamp: Duration, jpeg: Bytes) -> Self {
        Self {
            kind: MediaKind::Video,
            timestamp,
            data: jpeg,
        }
    }

    /// Create an audio frame
    pub fn audio(timestamp: Duration, data: Bytes) -> Self {
        Self {
            kind: MediaKind::Audio,
            timestamp,
            data,
        }
    }

    /// Whether this is a video frame
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Timestamp in whole milliseconds, saturating at `u32::MAX`
    pub fn timestamp_ms(&self) -> u32 {
        self.timestamp.as_millis().min(u32::MAX as u128) as u32
    }
}
