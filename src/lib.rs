//! # mjpeg-hub
//!
//! A live MJPEG streaming server built from raw TCP sockets upward: a
//! hand-rolled HTTP/1.1 parser and router, a fan-out hub pushing
//! `multipart/x-mixed-replace` frames to any number of viewers, a JSON
//! control plane, and an optional segmented recording pipeline publishing
//! an HLS-style sliding-window playlist.
//!
//! Camera capture and JPEG encoding stay outside the crate: an external
//! frame source pushes timestamped [`MediaFrame`]s into
//! [`StreamServer::ingest`], and control commands (toggle video/audio/
//! recording, change resolution) flow back out as [`ControlEvent`]s.
//!
//! # Architecture
//!
//! ```text
//!  Frame Source ──► StreamServer::ingest ──┬──► StreamHub ──► N viewers
//!  (external)                              └──► SegmentWriter ──► segmentN.flv
//!                                                            └──► playlist.m3u8
//!
//!  Browser ──► Listener ──► Router ──┬──► StreamHub (GET /stream)
//!                                    ├──► static page / JSON status
//!                                    └──► ControlEvent ──► frame source owner
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use mjpeg_hub::{MediaFrame, ServerConfig, StreamServer};
//!
//! # async fn run() -> mjpeg_hub::Result<()> {
//! let (server, mut control) = StreamServer::new(ServerConfig::default());
//! let addr = server.start().await?;
//! println!("serving http://{}", addr);
//!
//! // Frames come from the external capture pipeline
//! server
//!     .ingest(MediaFrame::video(Duration::ZERO, Bytes::from_static(b"...")))
//!     .await;
//!
//! // Control commands flow out to whoever owns the camera
//! if let Some(event) = control.recv().await {
//!     println!("control: {:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod control;
pub mod error;
pub mod http;
pub mod hub;
pub mod media;
pub mod recorder;
pub mod registry;
pub mod server;
pub mod stats;

pub use control::{ControlEvent, ControlReceiver, ControlSender};
pub use error::{Error, Result};
pub use hub::{StreamHub, STREAM_BOUNDARY};
pub use media::{MediaFrame, MediaKind};
pub use recorder::{RecorderConfig, SegmentWriter};
pub use registry::{ConnectionKind, ConnectionRegistry};
pub use server::{ServerConfig, StreamServer};
pub use stats::ServerStatus;
