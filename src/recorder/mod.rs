//! Segmented recording pipeline
//!
//! Frames flowing in while recording is active are muxed into rotating FLV
//! segments of a fixed target duration; a sliding-window HLS playlist
//! advertises the most recent finalized segments.

pub mod playlist;
pub mod writer;

pub use writer::{RecorderConfig, SegmentWriter};
