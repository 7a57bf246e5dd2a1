//! Media frame types and segment container muxing
//!
//! The core never produces media itself: an external frame source pushes
//! timestamped [`MediaFrame`]s in (JPEG buffers for video), and this module
//! provides the types for carrying them plus the FLV muxer used by the
//! recording pipeline.

pub mod flv;
pub mod frame;

pub use frame::{MediaFrame, MediaKind};
