// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Geometric normalization: re-center and rescale each body part into a
//! part-local, scale/translation-invariant reference frame.
//!
//! Each part is centered on its anchor joint and divided by a per-frame
//! reference distance (shoulder span for pose, eye span for face,
//! wrist-to-mid-finger for hands). Missing joints stay the sentinel through
//! the whole transform: the validity mask is captured first and re-applied
//! after the arithmetic. The right hand is mirrored across the x-axis after
//! normalization so both hands share one coordinate convention.
//!
//! The transform is invertible; [`Normalizer::denormalize`] recovers the
//! input coordinates from the recorded per-frame parameters.

use ndarray::{s, Array1, Array2, Array3};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::keypoints::{
    apply_joint_mask, joint_mask, KeypointRecord, FACE_CENTER_INDEX, FACE_EYE_PAIR,
    HAND_CENTER_INDEX, HAND_WRIST_INDEX, POSE_CENTER_INDEX, POSE_SHOULDER_PAIR,
};

/// Per-frame parameters of one part's normalization, kept for inversion.
#[derive(Debug, Clone)]
pub struct PartTransform {
    /// Anchor joint coordinates per frame, `[frames, dims]`.
    pub center: Array2<f32>,
    /// Reference distance per frame.
    pub unit: Array1<f32>,
}

/// All four parts' transform parameters for one record.
#[derive(Debug, Clone)]
pub struct RecordTransform {
    /// Pose transform.
    pub pose: PartTransform,
    /// Face transform.
    pub face: PartTransform,
    /// Left-hand transform.
    pub left_hand: PartTransform,
    /// Right-hand transform.
    pub right_hand: PartTransform,
}

/// Translate+scale normalizer over filtered keypoint records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    ignore_value: f32,
}

impl Normalizer {
    /// Build a normalizer from pipeline configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ignore_value: config.ignore_value,
        }
    }

    /// Normalize all four parts of a filtered record.
    ///
    /// Takes ownership of the input and returns the normalized record plus
    /// the per-frame transform parameters needed to invert it.
    ///
    /// # Errors
    ///
    /// Returns a structural error when the record violates the frame-count
    /// invariant.
    pub fn normalize(&self, record: KeypointRecord) -> Result<(KeypointRecord, RecordTransform)> {
        record.validate()?;

        let KeypointRecord {
            mut pose,
            mut face,
            mut left_hand,
            mut right_hand,
            frame_count,
        } = record;

        let pose_t = self.normalize_part(&mut pose, POSE_CENTER_INDEX, POSE_SHOULDER_PAIR);
        let face_t = self.normalize_part(&mut face, FACE_CENTER_INDEX, FACE_EYE_PAIR);
        let lh_t = self.normalize_part(
            &mut left_hand,
            HAND_CENTER_INDEX,
            (HAND_CENTER_INDEX, HAND_WRIST_INDEX),
        );
        let rh_t = self.normalize_part(
            &mut right_hand,
            HAND_CENTER_INDEX,
            (HAND_CENTER_INDEX, HAND_WRIST_INDEX),
        );

        // Canonical hand convention: mirror the right hand across the x-axis.
        self.mirror_x(&mut right_hand);

        let normalized = KeypointRecord {
            pose,
            face,
            left_hand,
            right_hand,
            frame_count,
        };
        let transform = RecordTransform {
            pose: pose_t,
            face: face_t,
            left_hand: lh_t,
            right_hand: rh_t,
        };
        Ok((normalized, transform))
    }

    /// Invert [`Normalizer::normalize`] using the recorded parameters.
    ///
    /// Frames normalized with a zero reference distance collapse to the
    /// anchor location; all other frames recover their input coordinates
    /// within floating tolerance.
    #[must_use]
    pub fn denormalize(
        &self,
        record: KeypointRecord,
        transform: &RecordTransform,
    ) -> KeypointRecord {
        let KeypointRecord {
            mut pose,
            mut face,
            mut left_hand,
            mut right_hand,
            frame_count,
        } = record;

        // Undo the right-hand mirror before inverting scale and translation.
        self.mirror_x(&mut right_hand);

        self.denormalize_part(&mut pose, &transform.pose);
        self.denormalize_part(&mut face, &transform.face);
        self.denormalize_part(&mut left_hand, &transform.left_hand);
        self.denormalize_part(&mut right_hand, &transform.right_hand);

        KeypointRecord {
            pose,
            face,
            left_hand,
            right_hand,
            frame_count,
        }
    }

    /// Center one part on its anchor joint and rescale by the per-frame
    /// reference distance between `ref_pair`.
    fn normalize_part(
        &self,
        part: &mut Array3<f32>,
        center_joint: usize,
        ref_pair: (usize, usize),
    ) -> PartTransform {
        let (frames, joints, dims) = part.dim();
        let mask = joint_mask(part, self.ignore_value);

        // Anchor coordinates, captured before subtraction.
        let center: Array2<f32> = part.slice(s![.., center_joint, ..]).to_owned();

        for f in 0..frames {
            for j in 0..joints {
                for d in 0..dims {
                    part[[f, j, d]] -= center[[f, d]];
                }
            }
        }

        // Per-frame reference distance; centering cancels in the difference.
        let (a, b) = ref_pair;
        let unit = Array1::from_shape_fn(frames, |f| {
            (0..dims)
                .map(|d| {
                    let diff = part[[f, a, d]] - part[[f, b, d]];
                    diff * diff
                })
                .sum::<f32>()
                .sqrt()
        });

        for f in 0..frames {
            if unit[f] > 0.0 {
                let inv = 1.0 / unit[f];
                part.slice_mut(s![f, .., ..]).mapv_inplace(|v| v * inv);
            } else {
                // Zero reference distance collapses the frame to zero
                // instead of propagating NaN/Inf.
                part.slice_mut(s![f, .., ..]).fill(0.0);
            }
        }

        apply_joint_mask(part, &mask, self.ignore_value);
        PartTransform { center, unit }
    }

    /// Invert translate+scale for one part, sentinel-preserving.
    fn denormalize_part(&self, part: &mut Array3<f32>, transform: &PartTransform) {
        let (frames, joints, dims) = part.dim();
        let mask = joint_mask(part, self.ignore_value);

        for f in 0..frames {
            for j in 0..joints {
                for d in 0..dims {
                    part[[f, j, d]] = part[[f, j, d]] * transform.unit[f] + transform.center[[f, d]];
                }
            }
        }

        apply_joint_mask(part, &mask, self.ignore_value);
    }

    /// Negate the x channel of every valid joint.
    fn mirror_x(&self, part: &mut Array3<f32>) {
        let mask = joint_mask(part, self.ignore_value);
        part.slice_mut(s![.., .., 0]).mapv_inplace(|v| -v);
        apply_joint_mask(part, &mask, self.ignore_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::IGNORE_VALUE;
    use ndarray::Array3;

    fn normalizer() -> Normalizer {
        Normalizer::new(&PipelineConfig::default())
    }

    /// A record whose joints are all valid with distinct coordinates.
    fn valid_record(frames: usize) -> KeypointRecord {
        let fill = |joints: usize| {
            Array3::from_shape_fn((frames, joints, 3), |(f, j, d)| {
                0.1 + f as f32 * 0.01 + j as f32 * 0.02 + d as f32 * 0.005
            })
        };
        KeypointRecord {
            pose: fill(15),
            face: fill(25),
            left_hand: fill(21),
            right_hand: fill(21),
            frame_count: frames,
        }
    }

    #[test]
    fn test_center_joint_lands_at_origin() {
        let record = valid_record(4);
        let (out, _) = normalizer().normalize(record).unwrap();

        for f in 0..4 {
            for d in 0..3 {
                assert!(out.pose[[f, POSE_CENTER_INDEX, d]].abs() < 1e-6);
                assert!(out.face[[f, FACE_CENTER_INDEX, d]].abs() < 1e-6);
                assert!(out.left_hand[[f, HAND_CENTER_INDEX, d]].abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_reference_distance_is_unit() {
        let record = valid_record(3);
        let (out, _) = normalizer().normalize(record).unwrap();

        let (a, b) = POSE_SHOULDER_PAIR;
        for f in 0..3 {
            let dist: f32 = (0..3)
                .map(|d| (out.pose[[f, a, d]] - out.pose[[f, b, d]]).powi(2))
                .sum::<f32>()
                .sqrt();
            assert!((dist - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sentinel_preserved_through_transform() {
        let mut record = valid_record(3);
        for d in 0..3 {
            record.pose[[1, 4, d]] = IGNORE_VALUE;
        }
        let before = joint_mask(&record.pose, IGNORE_VALUE);

        let (out, _) = normalizer().normalize(record).unwrap();
        let after = joint_mask(&out.pose, IGNORE_VALUE);

        assert_eq!(before, after);
        for d in 0..3 {
            assert_eq!(out.pose[[1, 4, d]], IGNORE_VALUE);
        }
    }

    #[test]
    fn test_right_hand_mirrored() {
        let record = valid_record(2);
        let lh = record.left_hand.clone();
        let rh = record.right_hand.clone();
        assert_eq!(lh, rh);

        let (out, _) = normalizer().normalize(record).unwrap();
        // Identical raw hands normalize to x-mirrored copies.
        for f in 0..2 {
            for j in 0..21 {
                assert!((out.left_hand[[f, j, 0]] + out.right_hand[[f, j, 0]]).abs() < 1e-6);
                assert!((out.left_hand[[f, j, 1]] - out.right_hand[[f, j, 1]]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_round_trip_recovers_coordinates() {
        let record = valid_record(5);
        let original = record.clone();

        let n = normalizer();
        let (out, transform) = n.normalize(record).unwrap();
        let restored = n.denormalize(out, &transform);

        for (orig, back) in [
            (&original.pose, &restored.pose),
            (&original.face, &restored.face),
            (&original.left_hand, &restored.left_hand),
            (&original.right_hand, &restored.right_hand),
        ] {
            for (a, b) in orig.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-5, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_zero_reference_distance_yields_zeros_not_nan() {
        let mut record = valid_record(3);
        // Collapse frame 1's shoulders onto one point.
        let (a, b) = POSE_SHOULDER_PAIR;
        for d in 0..3 {
            let v = record.pose[[1, a, d]];
            record.pose[[1, b, d]] = v;
        }

        let (out, _) = normalizer().normalize(record).unwrap();

        assert!(out.pose.iter().all(|v| v.is_finite()));
        for j in 0..15 {
            for d in 0..3 {
                assert_eq!(out.pose[[1, j, d]], 0.0);
            }
        }
        // Other frames still carry non-trivial geometry.
        assert!(out.pose.slice(s![0, .., ..]).iter().any(|&v| v != 0.0));
    }
}
