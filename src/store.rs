// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Skeleton dataset accumulation and persistence.
//!
//! The store buffers per-frame keypoints for the video being recorded; on
//! [`SkeletonStore::finish_video`] a sufficiently long buffer becomes a
//! completed [`KeypointRecord`], short ones are dropped with a warning. On
//! [`SkeletonStore::finish_file`] the completed videos are written to a JSON
//! document of groups keyed by sequential integer IDs, merging with any
//! existing file rather than overwriting it.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::keypoints::{FrameKeypoints, KeypointRecord};

/// Accumulates per-video keypoint sequences into a persistent dataset.
#[derive(Debug)]
pub struct SkeletonStore {
    min_video_frames: usize,
    frames: Vec<FrameKeypoints>,
    completed: Vec<KeypointRecord>,
}

impl SkeletonStore {
    /// Build a store from pipeline configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_video_frames: config.min_video_frames,
            frames: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Buffer one frame of the current video.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] on a shape mismatch; the
    /// buffer is left untouched.
    pub fn add_frame(&mut self, frame: FrameKeypoints) -> Result<()> {
        frame.validate()?;
        self.frames.push(frame);
        Ok(())
    }

    /// Frames buffered for the current video.
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    /// Completed videos awaiting persistence.
    #[must_use]
    pub fn completed_videos(&self) -> usize {
        self.completed.len()
    }

    /// Commit the current buffer as a completed video if it exceeds the
    /// minimum frame count; drop it with a warning otherwise.
    ///
    /// Returns `true` when the video was committed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] if the buffered frames
    /// cannot be stacked; the buffer is cleared either way.
    pub fn finish_video(&mut self) -> Result<bool> {
        if self.frames.len() <= self.min_video_frames {
            if !self.frames.is_empty() {
                crate::warn!(
                    "Video too short ({} frames, need > {}), skipped.",
                    self.frames.len(),
                    self.min_video_frames
                );
            }
            self.frames.clear();
            return Ok(false);
        }

        let record = KeypointRecord::from_frames(&self.frames);
        self.frames.clear();
        self.completed.push(record?);
        Ok(true)
    }

    /// Throw away the in-progress buffer (frame acquisition failed); the
    /// partial video never becomes a store entry.
    pub fn discard_video(&mut self) {
        self.frames.clear();
    }

    /// Persist the completed videos, merging with any existing file.
    ///
    /// Returns the total number of videos in the written file, or 0 when
    /// there was nothing to write (no file is touched in that case). The
    /// completed list is cleared after a successful write.
    ///
    /// # Errors
    ///
    /// Returns IO/serialization errors; the in-memory list survives a
    /// failed write.
    pub fn finish_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        if self.completed.is_empty() {
            return Ok(0);
        }
        let path = path.as_ref();

        let mut to_dump = Vec::new();
        if path.is_file() {
            crate::verbose!("Found existing dataset at {}, merging.", path.display());
            to_dump.extend(load_file(path)?);
        }
        to_dump.extend(self.completed.iter().cloned());

        save_file(path, &to_dump)?;
        self.completed.clear();
        Ok(to_dump.len())
    }
}

/// Write a dataset file: a JSON object of groups keyed by "0", "1", ...
///
/// # Errors
///
/// Returns IO/serialization errors.
pub fn save_file<P: AsRef<Path>>(path: P, videos: &[KeypointRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut groups = Map::with_capacity(videos.len());
    for (i, video) in videos.iter().enumerate() {
        video.validate()?;
        groups.insert(i.to_string(), serde_json::to_value(video)?);
    }
    let text = serde_json::to_string(&Value::Object(groups))?;
    fs::write(path, text)?;
    Ok(())
}

/// Load a dataset file written by [`save_file`], in sequential-ID order.
///
/// # Errors
///
/// Returns [`PipelineError::SerializationError`] on malformed documents or
/// non-integer group keys.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<KeypointRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let doc: Map<String, Value> = serde_json::from_str(&text)?;

    let mut keyed: Vec<(usize, KeypointRecord)> = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        let id: usize = key.parse().map_err(|_| {
            PipelineError::SerializationError(format!(
                "{}: group key {key:?} is not a sequential ID",
                path.display()
            ))
        })?;
        let record: KeypointRecord = serde_json::from_value(value)?;
        record.validate()?;
        keyed.push((id, record));
    }
    keyed.sort_by_key(|(id, _)| *id);
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SkeletonStore {
        SkeletonStore::new(&PipelineConfig::default())
    }

    fn push_frames(store: &mut SkeletonStore, n: usize) {
        for _ in 0..n {
            store.add_frame(FrameKeypoints::empty()).unwrap();
        }
    }

    #[test]
    fn test_short_video_dropped() {
        let mut s = store();
        push_frames(&mut s, 11);
        assert!(!s.finish_video().unwrap());
        assert_eq!(s.completed_videos(), 0);
        assert_eq!(s.buffered_frames(), 0);
    }

    #[test]
    fn test_threshold_boundary() {
        // Exactly the threshold is still too short; one past it is kept.
        let mut s = store();
        push_frames(&mut s, 12);
        assert!(!s.finish_video().unwrap());

        push_frames(&mut s, 13);
        assert!(s.finish_video().unwrap());
        assert_eq!(s.completed_videos(), 1);
    }

    #[test]
    fn test_discard_video_drops_buffer() {
        let mut s = store();
        push_frames(&mut s, 20);
        s.discard_video();
        assert_eq!(s.buffered_frames(), 0);
        assert!(!s.finish_video().unwrap());
        assert_eq!(s.completed_videos(), 0);
    }

    #[test]
    fn test_bad_frame_rejected_buffer_untouched() {
        let mut s = store();
        push_frames(&mut s, 2);
        let mut bad = FrameKeypoints::empty();
        bad.face = ndarray::Array2::zeros((3, 3));
        assert!(s.add_frame(bad).is_err());
        assert_eq!(s.buffered_frames(), 2);
    }

    #[test]
    fn test_finish_file_merges_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");

        // First session: two videos.
        let mut s = store();
        push_frames(&mut s, 14);
        s.finish_video().unwrap();
        push_frames(&mut s, 15);
        s.finish_video().unwrap();
        assert_eq!(s.finish_file(&path).unwrap(), 2);
        assert_eq!(s.completed_videos(), 0);

        // Second session: one more video merges, not overwrites.
        let mut s = store();
        push_frames(&mut s, 16);
        s.finish_video().unwrap();
        assert_eq!(s.finish_file(&path).unwrap(), 3);

        let videos = load_file(&path).unwrap();
        assert_eq!(videos.len(), 3);
        assert_eq!(videos[0].frame_count, 14);
        assert_eq!(videos[1].frame_count, 15);
        assert_eq!(videos[2].frame_count, 16);
    }

    #[test]
    fn test_finish_file_failed_write_keeps_videos() {
        // Writing to a directory path fails; the completed list must survive
        // so a later finish_file can still persist the videos.
        let dir = tempfile::tempdir().unwrap();
        let mut s = store();
        push_frames(&mut s, 14);
        s.finish_video().unwrap();

        assert!(s.finish_file(dir.path()).is_err());
        assert_eq!(s.completed_videos(), 1);

        let path = dir.path().join("dataset.json");
        assert_eq!(s.finish_file(&path).unwrap(), 1);
        assert_eq!(s.completed_videos(), 0);
    }

    #[test]
    fn test_finish_file_empty_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let mut s = store();
        assert_eq!(s.finish_file(&path).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_load_rejects_non_integer_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, r#"{"video_a": {}}"#).unwrap();
        assert!(matches!(
            load_file(&path),
            Err(PipelineError::SerializationError(_))
        ));
    }
}
