// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Keypoint data model: per-frame detections and per-video records.
//!
//! A video is represented by four parallel arrays indexed by frame, one per
//! body part (pose, face, left hand, right hand). Joints a detector could not
//! see are marked with a dedicated sentinel value ([`IGNORE_VALUE`]) distinct
//! from any valid coordinate; raw detector output uses `0.0`
//! ([`MISSING_VALUE`]) for "nothing found", which the visibility filter
//! converts to the sentinel before any geometry runs.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ================================================================================================
// Constants
// ================================================================================================

/// Sentinel marking "no valid data" for a joint. Never a plausible coordinate.
pub const IGNORE_VALUE: f32 = -5.0;

/// Raw detector marker for "nothing found". Only valid before filtering.
pub const MISSING_VALUE: f32 = 0.0;

/// Number of selected pose joints.
pub const NUM_POSE_JOINTS: usize = 15;
/// Number of selected face landmarks.
pub const NUM_FACE_JOINTS: usize = 25;
/// Number of hand joints (canonical hand topology: wrist = 0, fingertip chains).
pub const NUM_HAND_JOINTS: usize = 21;

/// Raw pose channels: x, y, z, visibility.
pub const RAW_POSE_DIMS: usize = 4;
/// Geometry channels after the visibility filter.
pub const KEYPOINT_DIMS: usize = 3;

/// Pose anchor joint (nose) used for re-centering pose and face.
pub const POSE_CENTER_INDEX: usize = 0;
/// Left/right shoulder pair, the pose scale reference.
pub const POSE_SHOULDER_PAIR: (usize, usize) = (5, 6);
/// Face anchor landmark.
pub const FACE_CENTER_INDEX: usize = 1;
/// Left/right eye pair, the face scale reference.
pub const FACE_EYE_PAIR: (usize, usize) = (16, 22);
/// Wrist joint in the canonical hand topology.
pub const HAND_WRIST_INDEX: usize = 0;
/// Mid-finger base joint, the hand anchor.
pub const HAND_CENTER_INDEX: usize = 9;

/// Pose joints tied to the left hand (wrist + mid-finger chain).
pub const LEFT_HAND_POSE_JOINTS: [usize; 2] = [9, 13];
/// Pose joints tied to the right hand (wrist + mid-finger chain).
pub const RIGHT_HAND_POSE_JOINTS: [usize; 2] = [10, 14];

/// Finger chains by joint index: thumb, index, middle, ring, pinky.
pub const FINGER_CHAINS: [[usize; 4]; 5] = [
    [1, 2, 3, 4],
    [5, 6, 7, 8],
    [9, 10, 11, 12],
    [13, 14, 15, 16],
    [17, 18, 19, 20],
];

// ================================================================================================
// Frame-level types
// ================================================================================================

/// One frame's detected joints for all four body parts.
///
/// Shapes are fixed: pose `(15, 4)` with a trailing visibility channel,
/// face `(25, 3)`, each hand `(21, 3)`. Parts the detector did not find are
/// zero-filled ([`MISSING_VALUE`]), never an error.
#[derive(Debug, Clone)]
pub struct FrameKeypoints {
    /// Pose joints with visibility channel, shape `(15, 4)`.
    pub pose: Array2<f32>,
    /// Face landmarks, shape `(25, 3)`.
    pub face: Array2<f32>,
    /// Left-hand joints, shape `(21, 3)`.
    pub left_hand: Array2<f32>,
    /// Right-hand joints, shape `(21, 3)`.
    pub right_hand: Array2<f32>,
}

impl FrameKeypoints {
    /// Create an empty (all-missing) frame.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            pose: Array2::zeros((NUM_POSE_JOINTS, RAW_POSE_DIMS)),
            face: Array2::zeros((NUM_FACE_JOINTS, KEYPOINT_DIMS)),
            left_hand: Array2::zeros((NUM_HAND_JOINTS, KEYPOINT_DIMS)),
            right_hand: Array2::zeros((NUM_HAND_JOINTS, KEYPOINT_DIMS)),
        }
    }

    /// Whether the pose detector found nobody in this frame.
    #[must_use]
    pub fn is_person_missing(&self) -> bool {
        self.pose.iter().all(|&v| v == MISSING_VALUE)
    }

    /// Validate part shapes against the canonical layout.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] on any shape mismatch.
    pub fn validate(&self) -> Result<()> {
        check_shape("pose", self.pose.view(), (NUM_POSE_JOINTS, RAW_POSE_DIMS))?;
        check_shape("face", self.face.view(), (NUM_FACE_JOINTS, KEYPOINT_DIMS))?;
        check_shape(
            "left_hand",
            self.left_hand.view(),
            (NUM_HAND_JOINTS, KEYPOINT_DIMS),
        )?;
        check_shape(
            "right_hand",
            self.right_hand.view(),
            (NUM_HAND_JOINTS, KEYPOINT_DIMS),
        )
    }
}

fn check_shape(name: &str, arr: ArrayView2<'_, f32>, expected: (usize, usize)) -> Result<()> {
    if arr.dim() == expected {
        Ok(())
    } else {
        Err(PipelineError::StructuralError(format!(
            "{name} shape {:?} does not match expected {expected:?}",
            arr.dim()
        )))
    }
}

// ================================================================================================
// Video-level record
// ================================================================================================

/// One video's keypoint sequence: four parallel `[frames, joints, dims]`
/// arrays plus the shared frame count.
///
/// Invariant: all four arrays hold exactly [`KeypointRecord::frame_count`]
/// frames at every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointRecord {
    /// Pose frames. Raw records carry 4 dims (visibility channel), filtered
    /// records carry 3.
    pub pose: Array3<f32>,
    /// Face frames, `[frames, 25, 3]`.
    pub face: Array3<f32>,
    /// Left-hand frames, `[frames, 21, 3]`.
    pub left_hand: Array3<f32>,
    /// Right-hand frames, `[frames, 21, 3]`.
    pub right_hand: Array3<f32>,
    /// Number of frames, shared by all four arrays.
    pub frame_count: usize,
}

impl KeypointRecord {
    /// Stack buffered frames into a record.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] if the buffers are empty or
    /// their lengths diverge.
    pub fn from_frames(frames: &[FrameKeypoints]) -> Result<Self> {
        if frames.is_empty() {
            return Err(PipelineError::StructuralError(
                "cannot build a record from zero frames".to_string(),
            ));
        }
        for frame in frames {
            frame.validate()?;
        }

        let stack = |get: fn(&FrameKeypoints) -> &Array2<f32>| -> Array3<f32> {
            let views: Vec<_> = frames.iter().map(|f| get(f).view()).collect();
            ndarray::stack(Axis(0), &views).expect("uniform frame shapes")
        };

        Ok(Self {
            pose: stack(|f| &f.pose),
            face: stack(|f| &f.face),
            left_hand: stack(|f| &f.left_hand),
            right_hand: stack(|f| &f.right_hand),
            frame_count: frames.len(),
        })
    }

    /// Check the shared-frame-count invariant and per-part joint counts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StructuralError`] when any array disagrees
    /// with `frame_count` or carries the wrong joint count.
    pub fn validate(&self) -> Result<()> {
        let parts: [(&str, &Array3<f32>, usize); 4] = [
            ("pose", &self.pose, NUM_POSE_JOINTS),
            ("face", &self.face, NUM_FACE_JOINTS),
            ("left_hand", &self.left_hand, NUM_HAND_JOINTS),
            ("right_hand", &self.right_hand, NUM_HAND_JOINTS),
        ];
        for (name, arr, joints) in parts {
            if arr.shape()[0] != self.frame_count {
                return Err(PipelineError::StructuralError(format!(
                    "{name} holds {} frames, record says {}",
                    arr.shape()[0],
                    self.frame_count
                )));
            }
            if arr.shape()[1] != joints {
                return Err(PipelineError::StructuralError(format!(
                    "{name} holds {} joints, expected {joints}",
                    arr.shape()[1]
                )));
            }
        }
        Ok(())
    }
}

// ================================================================================================
// Validity masks
// ================================================================================================

/// Per-joint validity mask for one part, shape `[frames, joints]`.
///
/// A joint is valid only if all of its coordinate dims differ from the
/// sentinel.
#[must_use]
pub fn joint_mask(part: &Array3<f32>, ignore_value: f32) -> Array2<bool> {
    let (frames, joints, _dims) = part.dim();
    Array2::from_shape_fn((frames, joints), |(f, j)| {
        part.index_axis(Axis(0), f)
            .index_axis(Axis(0), j)
            .iter()
            .all(|&v| v != ignore_value)
    })
}

/// Force every joint that is invalid under `mask` back to the sentinel.
///
/// Arithmetic on sentinel entries produces garbage numbers; this restores
/// them so downstream masking still recognizes the joint as missing.
pub fn apply_joint_mask(part: &mut Array3<f32>, mask: &Array2<bool>, ignore_value: f32) {
    let (frames, joints, dims) = part.dim();
    for f in 0..frames {
        for j in 0..joints {
            if !mask[[f, j]] {
                for d in 0..dims {
                    part[[f, j, d]] = ignore_value;
                }
            }
        }
    }
}

// ================================================================================================
// Joint selection (full detector output -> canonical subsets)
// ================================================================================================

/// Select the canonical pose joints from a full detector output frame.
///
/// # Errors
///
/// Returns [`PipelineError::StructuralError`] if the input lacks the
/// visibility channel or a selected index is out of range.
pub fn select_pose_joints(full: ArrayView2<'_, f32>, selected: &[usize]) -> Result<Array2<f32>> {
    if full.shape()[1] != RAW_POSE_DIMS {
        return Err(PipelineError::StructuralError(format!(
            "raw pose frame carries {} channels, expected {RAW_POSE_DIMS} (missing visibility?)",
            full.shape()[1]
        )));
    }
    select_rows(full, selected)
}

/// Select the canonical face landmarks from a full face-mesh output frame.
///
/// # Errors
///
/// Returns [`PipelineError::StructuralError`] if a selected index is out of
/// range.
pub fn select_face_joints(full: ArrayView2<'_, f32>, selected: &[usize]) -> Result<Array2<f32>> {
    select_rows(full, selected)
}

fn select_rows(full: ArrayView2<'_, f32>, selected: &[usize]) -> Result<Array2<f32>> {
    let rows = full.shape()[0];
    if let Some(&bad) = selected.iter().find(|&&i| i >= rows) {
        return Err(PipelineError::StructuralError(format!(
            "selected joint {bad} out of range for detector output with {rows} joints"
        )));
    }
    let mut out = Array2::zeros((selected.len(), full.shape()[1]));
    for (dst, &src) in selected.iter().enumerate() {
        out.row_mut(dst).assign(&full.row(src));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_frame_validate_shapes() {
        let frame = FrameKeypoints::empty();
        assert!(frame.validate().is_ok());

        let mut bad = FrameKeypoints::empty();
        bad.pose = Array2::zeros((NUM_POSE_JOINTS, 3));
        assert!(matches!(
            bad.validate(),
            Err(PipelineError::StructuralError(_))
        ));
    }

    #[test]
    fn test_person_missing() {
        let frame = FrameKeypoints::empty();
        assert!(frame.is_person_missing());

        let mut frame = FrameKeypoints::empty();
        frame.pose[[0, 0]] = 0.4;
        assert!(!frame.is_person_missing());
    }

    #[test]
    fn test_record_from_frames() {
        let frames = vec![FrameKeypoints::empty(); 5];
        let record = KeypointRecord::from_frames(&frames).unwrap();
        assert_eq!(record.frame_count, 5);
        assert_eq!(record.pose.dim(), (5, NUM_POSE_JOINTS, RAW_POSE_DIMS));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_frame_count_invariant() {
        let frames = vec![FrameKeypoints::empty(); 3];
        let mut record = KeypointRecord::from_frames(&frames).unwrap();
        record.frame_count = 4;
        assert!(matches!(
            record.validate(),
            Err(PipelineError::StructuralError(_))
        ));
    }

    #[test]
    fn test_joint_mask_tuple_semantics() {
        // A joint is invalid when any of its dims carries the sentinel.
        let mut part = Array3::zeros((1, 2, 3));
        part[[0, 1, 2]] = IGNORE_VALUE;
        let mask = joint_mask(&part, IGNORE_VALUE);
        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 1]]);
    }

    #[test]
    fn test_apply_joint_mask_restores_sentinel() {
        let mut part = Array3::from_elem((1, 2, 3), IGNORE_VALUE);
        let mask = joint_mask(&part, IGNORE_VALUE);

        // Arithmetic corrupts the sentinel entries...
        part += 1.0;
        // ...and re-masking restores them bit-exactly.
        apply_joint_mask(&mut part, &mask, IGNORE_VALUE);
        assert!(part.iter().all(|&v| v == IGNORE_VALUE));
    }

    #[test]
    fn test_select_pose_requires_visibility() {
        let full = Array2::<f32>::zeros((33, 3));
        assert!(select_pose_joints(full.view(), &[0, 1]).is_err());

        let full = Array2::<f32>::zeros((33, 4));
        let out = select_pose_joints(full.view(), &[0, 11, 12]).unwrap();
        assert_eq!(out.dim(), (3, 4));
    }

    #[test]
    fn test_select_rows_out_of_range() {
        let full = Array2::<f32>::zeros((468, 3));
        assert!(select_face_joints(full.view(), &[467]).is_ok());
        assert!(select_face_joints(full.view(), &[468]).is_err());
    }
}
