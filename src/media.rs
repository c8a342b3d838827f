//! File naming for recordings, stills, and daily logs.

use chrono::{DateTime, Datelike, Local};
use std::path::{Path, PathBuf};

/// Prefix every recording carries; retention only evicts files named this way.
pub const VIDEO_PREFIX: &str = "vid_";
pub const IMAGE_PREFIX: &str = "img_";
pub const LOG_PREFIX: &str = "log_";
pub const VIDEO_EXT: &str = "h264";
pub const IMAGE_EXT: &str = "jpg";
pub const LOG_EXT: &str = "txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

/// Build a timestamped file name such as `vid_2024-05-01_13-45-12-123456.h264`.
pub fn media_file_name(kind: MediaKind, now: DateTime<Local>) -> String {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S-%6f");
    match kind {
        MediaKind::Video => format!("{VIDEO_PREFIX}{stamp}.{VIDEO_EXT}"),
        MediaKind::Image => format!("{IMAGE_PREFIX}{stamp}.{IMAGE_EXT}"),
    }
}

pub fn media_path(dir: &Path, kind: MediaKind, now: DateTime<Local>) -> PathBuf {
    dir.join(media_file_name(kind, now))
}

/// Daily log file name, e.g. `log_2024-5-1.txt`.
pub fn log_file_name(now: DateTime<Local>) -> String {
    format!(
        "{LOG_PREFIX}{}-{}-{}.{LOG_EXT}",
        now.year(),
        now.month(),
        now.day()
    )
}

/// Whether `path` names a recording this program wrote.
pub fn is_video_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(VIDEO_PREFIX))
        .unwrap_or(false)
}

/// Overlay text burned into the video.
pub fn annotation_text(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d, %H:%M:%S").to_string()
}
