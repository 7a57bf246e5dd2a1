//! HLS playlist rendering and atomic publication
//!
//! The playlist is a small live manifest: `#EXT-X-MEDIA-SEQUENCE` equals the
//! oldest advertised segment's index, and the entry list is the sliding
//! window handed in by the writer. Every rewrite goes through a temp file
//! and an atomic rename so a concurrent reader can never observe a torn
//! manifest.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// File name of the published manifest
pub const PLAYLIST_NAME: &str = "playlist.m3u8";

/// Staging name used for the atomic rewrite
const PLAYLIST_TMP_NAME: &str = ".playlist.m3u8.tmp";

/// One advertised segment
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    /// Segment file name relative to the playlist
    pub file_name: String,
    /// Measured duration in seconds
    pub duration: f64,
}

/// Render the manifest text
///
/// `media_sequence` must be the index of the first entry; entries are in
/// ascending index order.
pub fn render(target_duration: Duration, media_sequence: u64, entries: &[PlaylistEntry]) -> String {
    let target_secs = target_duration.as_secs_f64().ceil().max(1.0) as u64;

    let mut out = String::with_capacity(128 + entries.len() * 48);
    out.push_str("#EXTM3U\n");
    out.push_str("#EXT-X-VERSION:3\n");
    out.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", target_secs));
    out.push_str(&format!("#EXT-X-MEDIA-SEQUENCE:{}\n", media_sequence));

    for entry in entries {
        out.push_str(&format!("#EXTINF:{:.3},\n", entry.duration));
        out.push_str(&entry.file_name);
        out.push('\n');
    }

    out
}

/// Atomically replace the playlist in `dir` with `content`
///
/// Writes to a temp file in the same directory, flushes, then renames over
/// the live name. Rename within one directory is atomic on POSIX, so
/// readers see either the old manifest or the new one, never a prefix.
pub fn write_atomic(dir: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = dir.join(PLAYLIST_TMP_NAME);
    let final_path = dir.join(PLAYLIST_NAME);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, &final_path)
}
