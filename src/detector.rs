// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Keypoint detector interface.
//!
//! The pipeline consumes landmarks from an upstream pose/face/hand detector
//! once per frame. The detector itself lives behind [`KeypointDetector`];
//! this crate only fixes the contract: full-size landmark arrays, zeros for
//! "nothing found", a visibility channel on pose only.

use ndarray::{Array2, Array3};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::keypoints::{
    select_face_joints, select_pose_joints, FrameKeypoints, KEYPOINT_DIMS, NUM_HAND_JOINTS,
};

/// One frame's worth of raw detector landmarks, before joint selection.
///
/// Pose rows are (x, y, z, visibility); all other parts are (x, y, z).
/// A part the detector did not find is all zeros, never an error.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub pose: Array2<f32>,
    pub face: Array2<f32>,
    pub left_hand: Array2<f32>,
    pub right_hand: Array2<f32>,
}

impl RawDetection {
    /// A detection with every part zeroed ("nothing found anywhere").
    ///
    /// `pose_joints` and `face_joints` are the detector's full output sizes.
    #[must_use]
    pub fn empty(pose_joints: usize, face_joints: usize) -> Self {
        Self {
            pose: Array2::zeros((pose_joints, 4)),
            face: Array2::zeros((face_joints, KEYPOINT_DIMS)),
            left_hand: Array2::zeros((NUM_HAND_JOINTS, KEYPOINT_DIMS)),
            right_hand: Array2::zeros((NUM_HAND_JOINTS, KEYPOINT_DIMS)),
        }
    }

    /// Reduce the full detector output to the canonical joint subsets.
    ///
    /// # Errors
    ///
    /// Returns a structural error when a selection index is out of range or
    /// the pose lacks its visibility channel.
    pub fn select(&self, config: &PipelineConfig) -> Result<FrameKeypoints> {
        let frame = FrameKeypoints {
            pose: select_pose_joints(self.pose.view(), &config.selected_pose_joints)?,
            face: select_face_joints(self.face.view(), &config.selected_face_joints)?,
            left_hand: self.left_hand.clone(),
            right_hand: self.right_hand.clone(),
        };
        frame.validate()?;
        Ok(frame)
    }
}

/// Produces landmarks for camera frames, one frame at a time.
///
/// Frames are HWC `u8` images. Low confidence is not an error: a part the
/// detector cannot find comes back zero-filled and is converted to the
/// sentinel downstream by the visibility filter.
pub trait KeypointDetector {
    /// Detect landmarks in one frame.
    ///
    /// # Errors
    ///
    /// Returns an error only for detector failures (bad frame buffer, model
    /// fault), never for "no person in frame".
    fn detect(&mut self, frame: &Array3<u8>) -> Result<RawDetection>;
}
