//! Rotating segment writer
//!
//! State machine: `Idle -> Writing(segment N)`. Each segment is anchored at
//! the timestamp of its first video frame; once the cumulative timestamp
//! delta reaches the target duration the segment is finalized, the index
//! advances, and the playlist is rewritten to the sliding window of recent
//! finalized segments. Rotation is wall-clock-approximate: actual segment
//! length is >= target and bounded by one inter-frame interval above it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::media::{flv, MediaFrame, MediaKind};

use super::playlist::{self, PlaylistEntry};

/// Recording pipeline configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory segments and the playlist are written to
    pub output_dir: PathBuf,

    /// Target duration of one segment
    pub target_duration: Duration,

    /// How many finalized segments the playlist advertises
    pub playlist_window: usize,

    /// Segments smaller than this are treated as truncated and never
    /// advertised
    pub min_segment_bytes: u64,

    /// Mux audio frames into segments (video-only otherwise)
    pub mux_audio: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            target_duration: Duration::from_secs(2),
            playlist_window: 3,
            min_segment_bytes: 64,
            mux_audio: false,
        }
    }
}

impl RecorderConfig {
    /// Create a config writing to the given directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the target segment duration
    pub fn target_duration(mut self, duration: Duration) -> Self {
        self.target_duration = duration;
        self
    }

    /// Set the playlist window size
    pub fn playlist_window(mut self, window: usize) -> Self {
        self.playlist_window = window.max(1);
        self
    }

    /// Set the minimum advertised segment size
    pub fn min_segment_bytes(mut self, bytes: u64) -> Self {
        self.min_segment_bytes = bytes;
        self
    }

    /// Enable audio muxing
    pub fn mux_audio(mut self, enabled: bool) -> Self {
        self.mux_audio = enabled;
        self
    }
}

/// One finalized segment on disk
#[derive(Debug, Clone)]
struct FinishedSegment {
    index: u64,
    file_name: String,
    duration: f64,
    bytes: u64,
}

/// The segment currently being written
struct OpenSegment {
    index: u64,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Timestamp of the first video frame; segments are anchored lazily
    anchor: Option<Duration>,
    last_ts: Duration,
    frames: u64,
}

/// A recording session (the `Writing` state)
struct Session {
    finished: Vec<FinishedSegment>,
    current: Option<OpenSegment>,
    next_index: u64,
}

/// Segmented recording writer
///
/// All methods are callable from any thread; state is guarded by a mutex
/// and file writes are buffered synchronous I/O, as short as one FLV tag.
pub struct SegmentWriter {
    config: RecorderConfig,
    session: Mutex<Option<Session>>,
}

impl SegmentWriter {
    /// Create a writer in the `Idle` state
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// The configured output directory
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Path of the published playlist
    pub fn playlist_path(&self) -> PathBuf {
        self.config.output_dir.join(playlist::PLAYLIST_NAME)
    }

    /// Whether a recording session is active
    pub fn is_recording(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    /// Begin a recording session
    ///
    /// Creates the output directory, removes leftovers from earlier
    /// sessions, publishes an empty playlist, and opens segment 0. A no-op
    /// when already recording.
    pub fn start(&self) -> Result<()> {
        let mut session = self.session.lock().unwrap();
        if session.is_some() {
            return Ok(());
        }

        let dir = &self.config.output_dir;
        fs::create_dir_all(dir).map_err(|e| self.segment_io(dir.clone(), e))?;
        self.clear_output_dir(dir)?;

        let empty = playlist::render(self.config.target_duration, 0, &[]);
        playlist::write_atomic(dir, &empty).map_err(|e| self.segment_io(dir.clone(), e))?;

        let current = self.open_segment(0)?;
        *session = Some(Session {
            finished: Vec::new(),
            current: Some(current),
            next_index: 1,
        });

        tracing::info!(dir = %dir.display(), "Recording started");
        Ok(())
    }

    /// Feed one frame into the current session
    ///
    /// Ignored while `Idle`. Audio frames are muxed only when configured and
    /// never trigger rotation, so a missing audio track cannot stall video
    /// segments. A disk error stops the session cleanly and is returned.
    pub fn write_frame(&self, frame: &MediaFrame) -> Result<()> {
        let mut guard = self.session.lock().unwrap();
        let Some(session) = guard.as_mut() else {
            return Ok(());
        };

        let result = match frame.kind {
            MediaKind::Audio => self.write_audio(session, frame),
            MediaKind::Video => self.write_video(session, frame),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Segment write failed, stopping recording");
            // Best-effort teardown; the playlist keeps its last good state
            Self::abandon(guard.take());
            return Err(e);
        }

        Ok(())
    }

    /// End the session
    ///
    /// A partial segment is finalized without the duration threshold and the
    /// playlist is rewritten one last time. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.session.lock().unwrap();
        let Some(mut session) = guard.take() else {
            return Ok(());
        };

        if let Some(current) = session.current.take() {
            if current.frames > 0 {
                let finished = self.finalize_segment(current)?;
                session.finished.push(finished);
            } else {
                // Nothing was written; drop the empty container
                let _ = fs::remove_file(&current.path);
            }
        }

        self.rewrite_playlist(&session);
        tracing::info!(
            segments = session.finished.len(),
            "Recording stopped"
        );
        Ok(())
    }

    fn write_audio(&self, session: &mut Session, frame: &MediaFrame) -> Result<()> {
        if !self.config.mux_audio {
            return Ok(());
        }

        if let Some(current) = session.current.as_mut() {
            // Audio before the segment's video anchor has no reference
            // point yet; it is dropped rather than guessed at.
            if let Some(anchor) = current.anchor {
                let rel = frame.timestamp.saturating_sub(anchor);
                let rel_ms = rel.as_millis().min(u32::MAX as u128) as u32;
                flv::write_audio_raw(&mut current.writer, rel_ms, &frame.data)
                    .map_err(|e| self.segment_io(current.path.clone(), e))?;
            }
        }
        Ok(())
    }

    fn write_video(&self, session: &mut Session, frame: &MediaFrame) -> Result<()> {
        let Some(current) = session.current.as_mut() else {
            return Ok(());
        };

        let anchor = *current.anchor.get_or_insert(frame.timestamp);
        let rel = frame.timestamp.saturating_sub(anchor);
        let rel_ms = rel.as_millis().min(u32::MAX as u128) as u32;

        flv::write_video_jpeg(&mut current.writer, rel_ms, &frame.data)
            .map_err(|e| self.segment_io(current.path.clone(), e))?;
        current.frames += 1;
        current.last_ts = frame.timestamp;

        // Rotate once the cumulative timestamp delta reaches the target
        let rotate = rel >= self.config.target_duration;
        if rotate {
            if let Some(full) = session.current.take() {
                let finished = self.finalize_segment(full)?;
                session.finished.push(finished);
            }

            let next = self.open_segment(session.next_index)?;
            session.current = Some(next);
            session.next_index += 1;

            self.rewrite_playlist(session);
        }

        Ok(())
    }

    fn open_segment(&self, index: u64) -> Result<OpenSegment> {
        let path = self.config.output_dir.join(format!("segment{}.flv", index));
        let file = File::create(&path).map_err(|e| self.segment_io(path.clone(), e))?;
        let mut writer = BufWriter::new(file);

        flv::write_header(&mut writer, self.config.mux_audio)
            .map_err(|e| self.segment_io(path.clone(), e))?;

        tracing::debug!(segment = index, path = %path.display(), "Segment opened");
        Ok(OpenSegment {
            index,
            path,
            writer,
            anchor: None,
            last_ts: Duration::ZERO,
            frames: 0,
        })
    }

    fn finalize_segment(&self, mut segment: OpenSegment) -> Result<FinishedSegment> {
        segment
            .writer
            .flush()
            .map_err(|e| self.segment_io(segment.path.clone(), e))?;
        let file = segment
            .writer
            .into_inner()
            .map_err(|e| self.segment_io(segment.path.clone(), e.into_error()))?;
        file.sync_all()
            .map_err(|e| self.segment_io(segment.path.clone(), e))?;

        let bytes = file
            .metadata()
            .map_err(|e| self.segment_io(segment.path.clone(), e))?
            .len();

        let duration = segment
            .anchor
            .map(|anchor| segment.last_ts.saturating_sub(anchor).as_secs_f64())
            .unwrap_or(0.0);

        let file_name = segment
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            segment = segment.index,
            duration_s = duration,
            bytes = bytes,
            frames = segment.frames,
            "Segment finalized"
        );

        Ok(FinishedSegment {
            index: segment.index,
            file_name,
            duration,
            bytes,
        })
    }

    /// Publish the sliding window of recent healthy segments
    ///
    /// A playlist write failure is logged and skipped for this cycle; the
    /// previous manifest stays visible and intact.
    fn rewrite_playlist(&self, session: &Session) {
        let healthy: Vec<&FinishedSegment> = session
            .finished
            .iter()
            .filter(|s| s.bytes >= self.config.min_segment_bytes)
            .collect();

        let window_start = healthy.len().saturating_sub(self.config.playlist_window);
        let window = &healthy[window_start..];

        let media_sequence = window.first().map(|s| s.index).unwrap_or(0);
        let entries: Vec<PlaylistEntry> = window
            .iter()
            .map(|s| PlaylistEntry {
                file_name: s.file_name.clone(),
                duration: s.duration,
            })
            .collect();

        let content = playlist::render(self.config.target_duration, media_sequence, &entries);
        if let Err(e) = playlist::write_atomic(&self.config.output_dir, &content) {
            tracing::error!(error = %e, "Playlist rewrite failed, keeping previous manifest");
        }
    }

    /// Drop a session after an unrecoverable write error
    fn abandon(session: Option<Session>) {
        if let Some(mut session) = session {
            if let Some(mut current) = session.current.take() {
                let _ = current.writer.flush();
            }
        }
    }

    fn segment_io(&self, path: PathBuf, source: std::io::Error) -> Error {
        Error::SegmentIo { path, source }
    }

    /// Remove segments and manifests left over from an earlier session
    fn clear_output_dir(&self, dir: &Path) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| self.segment_io(dir.to_path_buf(), e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let stale = (name.starts_with("segment") && name.ends_with(".flv"))
                || name == playlist::PLAYLIST_NAME
                || name.ends_with(".m3u8.tmp");
            if stale {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}
