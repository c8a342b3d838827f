//! Bounded rolling window over passive recordings.

use crate::media::is_video_file;
use crate::services::ClipRecord;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    limit: usize,
}

impl RetentionPolicy {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Pick the clip to delete before the next one starts, if the window is full.
    ///
    /// Only files following the recording naming convention are candidates; the
    /// oldest modification time wins and ties go to the lexically smallest path.
    pub fn rotate(&self, clips: &[ClipRecord]) -> Option<PathBuf> {
        if clips.len() < self.limit {
            return None;
        }
        clips
            .iter()
            .filter(|clip| is_video_file(&clip.path))
            .min_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.path.cmp(&b.path))
            })
            .map(|clip| clip.path.clone())
    }
}
