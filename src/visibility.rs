// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Visibility filtering: suppress unreliable joints before any geometry runs.
//!
//! A hand is judged absent in a frame by cross-checking two detectors: the
//! pose detector's visibility channel on the hand-related pose joints, and
//! the standalone hand-landmark detector's raw "nothing found" marker. Absent
//! hands are replaced by the ignore sentinel in both representations, and the
//! visibility channel is dropped so only geometry proceeds downstream.

use ndarray::{s, Array3, Axis};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::keypoints::{
    KeypointRecord, LEFT_HAND_POSE_JOINTS, MISSING_VALUE, RAW_POSE_DIMS, RIGHT_HAND_POSE_JOINTS,
};

/// Suppresses low-confidence joints according to cross-part consistency rules.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    hand_visibility_threshold: f32,
    ignore_value: f32,
}

impl VisibilityFilter {
    /// Build a filter from pipeline configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            hand_visibility_threshold: config.hand_visibility_threshold,
            ignore_value: config.ignore_value,
        }
    }

    /// Filter one video's raw record.
    ///
    /// Takes ownership of the raw record and returns a new record whose pose
    /// array has the visibility channel removed. Frames where every joint is
    /// unreliable still propagate structurally as all-sentinel frames.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] if the pose array lacks the
    /// visibility channel or the record violates the frame-count invariant.
    pub fn filter(&self, record: KeypointRecord) -> Result<KeypointRecord> {
        record.validate()?;
        if record.pose.shape()[2] != RAW_POSE_DIMS {
            return Err(PipelineError::StructuralError(format!(
                "pose carries {} channels, visibility filtering requires {RAW_POSE_DIMS}",
                record.pose.shape()[2]
            )));
        }

        let KeypointRecord {
            mut pose,
            face,
            mut left_hand,
            mut right_hand,
            frame_count,
        } = record;

        let missing_left = self.hand_missing_by_frame(&pose, &left_hand, &LEFT_HAND_POSE_JOINTS);
        let missing_right = self.hand_missing_by_frame(&pose, &right_hand, &RIGHT_HAND_POSE_JOINTS);

        for f in 0..frame_count {
            if missing_left[f] {
                self.erase_pose_joints(&mut pose, f, &LEFT_HAND_POSE_JOINTS);
                left_hand
                    .index_axis_mut(Axis(0), f)
                    .fill(self.ignore_value);
            }
            if missing_right[f] {
                self.erase_pose_joints(&mut pose, f, &RIGHT_HAND_POSE_JOINTS);
                right_hand
                    .index_axis_mut(Axis(0), f)
                    .fill(self.ignore_value);
            }
        }

        // Convert the raw "nothing found" marker to the final sentinel in the
        // hand arrays; zero must never mean "missing" past this point.
        for hand in [&mut left_hand, &mut right_hand] {
            hand.mapv_inplace(|v| {
                if v == MISSING_VALUE {
                    self.ignore_value
                } else {
                    v
                }
            });
        }

        // Geometry only from here on.
        let pose = pose.slice(s![.., .., ..3]).to_owned();

        Ok(KeypointRecord {
            pose,
            face,
            left_hand,
            right_hand,
            frame_count,
        })
    }

    /// A hand is absent when every hand-related pose joint's visibility is
    /// below threshold, or when the hand-landmark detector found nothing.
    fn hand_missing_by_frame(
        &self,
        pose: &Array3<f32>,
        hand: &Array3<f32>,
        hand_pose_joints: &[usize],
    ) -> Vec<bool> {
        let frames = pose.shape()[0];
        (0..frames)
            .map(|f| {
                let low_visibility = hand_pose_joints
                    .iter()
                    .all(|&j| pose[[f, j, 3]] < self.hand_visibility_threshold);
                let no_landmarks = hand[[f, 0, 0]] == MISSING_VALUE;
                low_visibility || no_landmarks
            })
            .collect()
    }

    fn erase_pose_joints(&self, pose: &mut Array3<f32>, frame: usize, joints: &[usize]) {
        for &j in joints {
            pose.slice_mut(s![frame, j, ..]).fill(self.ignore_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::{
        FrameKeypoints, IGNORE_VALUE, NUM_HAND_JOINTS, NUM_POSE_JOINTS,
    };

    fn visible_frame() -> FrameKeypoints {
        let mut frame = FrameKeypoints::empty();
        frame.pose.fill(0.4);
        frame.face.fill(0.3);
        frame.left_hand.fill(0.2);
        frame.right_hand.fill(0.6);
        frame
    }

    fn filter() -> VisibilityFilter {
        VisibilityFilter::new(&PipelineConfig::default())
    }

    #[test]
    fn test_visible_hands_survive() {
        let record = KeypointRecord::from_frames(&vec![visible_frame(); 3]).unwrap();
        let out = filter().filter(record).unwrap();

        assert_eq!(out.pose.shape()[2], 3);
        assert!(out.left_hand.iter().all(|&v| v != IGNORE_VALUE));
        assert!(out.right_hand.iter().all(|&v| v != IGNORE_VALUE));
    }

    #[test]
    fn test_low_visibility_hand_erased() {
        let mut frame = visible_frame();
        for &j in &LEFT_HAND_POSE_JOINTS {
            frame.pose[[j, 3]] = 0.1;
        }
        let record = KeypointRecord::from_frames(&[frame]).unwrap();
        let out = filter().filter(record).unwrap();

        for &j in &LEFT_HAND_POSE_JOINTS {
            assert_eq!(out.pose[[0, j, 0]], IGNORE_VALUE);
        }
        assert!(out.left_hand.iter().all(|&v| v == IGNORE_VALUE));
        // Right hand untouched.
        assert!(out.right_hand.iter().all(|&v| (v - 0.6).abs() < 1e-6));
    }

    #[test]
    fn test_missing_landmarks_erase_pose_hand() {
        let mut frame = visible_frame();
        frame.right_hand.fill(MISSING_VALUE);
        let record = KeypointRecord::from_frames(&[frame]).unwrap();
        let out = filter().filter(record).unwrap();

        for &j in &RIGHT_HAND_POSE_JOINTS {
            assert_eq!(out.pose[[0, j, 0]], IGNORE_VALUE);
        }
        assert!(out.right_hand.iter().all(|&v| v == IGNORE_VALUE));
    }

    #[test]
    fn test_missing_confidence_channel_is_structural_error() {
        let record = KeypointRecord::from_frames(&vec![visible_frame(); 2]).unwrap();
        let filtered = filter().filter(record).unwrap();
        // Filtering an already-filtered record must fail loudly.
        assert!(matches!(
            filter().filter(filtered),
            Err(PipelineError::StructuralError(_))
        ));
    }

    #[test]
    fn test_all_missing_frame_propagates() {
        let mut frame = visible_frame();
        frame.left_hand.fill(MISSING_VALUE);
        frame.right_hand.fill(MISSING_VALUE);
        for j in 0..NUM_POSE_JOINTS {
            frame.pose[[j, 3]] = 0.0;
        }
        let record = KeypointRecord::from_frames(&[frame]).unwrap();
        let out = filter().filter(record).unwrap();

        assert_eq!(out.frame_count, 1);
        assert_eq!(out.left_hand.dim(), (1, NUM_HAND_JOINTS, 3));
        assert!(out.left_hand.iter().all(|&v| v == IGNORE_VALUE));
        assert!(out.right_hand.iter().all(|&v| v == IGNORE_VALUE));
    }
}
