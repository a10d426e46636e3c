// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Randomized geometric augmentation for training sequences.
//!
//! Each augmentation is toggled by its own coin flip with fixed design
//! probabilities. Every arithmetic op is wrapped mask-then-restore so a
//! sentinel-masked joint is never perturbed into a seemingly valid value:
//! the validity mask is identical before and after augmentation. The cut and
//! clamp rules re-mask geometry by zeroing it (zero is a valid coordinate),
//! never by touching sentinels.

#![allow(clippy::cast_precision_loss)]

use ndarray::{s, Array3};
use rand::Rng;

use crate::config::{AugmentConfig, PipelineConfig, Profile};
use crate::keypoints::{apply_joint_mask, joint_mask, KeypointRecord, FINGER_CHAINS, HAND_CENTER_INDEX};

/// Applies randomized geometric perturbations to normalized records.
#[derive(Debug, Clone)]
pub struct Augmentor {
    config: AugmentConfig,
    profile: Profile,
    ignore_value: f32,
}

impl Augmentor {
    /// Build an augmentor from pipeline configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.augment.clone(),
            profile: config.profile,
            ignore_value: config.ignore_value,
        }
    }

    /// Return an augmented copy of a normalized record; the input is
    /// untouched.
    #[must_use]
    pub fn augment<R: Rng + ?Sized>(&self, record: &KeypointRecord, rng: &mut R) -> KeypointRecord {
        let mut out = record.clone();

        if rng.gen::<f64>() < self.config.mirror_prob {
            self.mirror(&mut out);
        }
        if rng.gen::<f64>() < self.config.rotate_prob {
            match self.profile {
                Profile::Pose2d => self.rotate_2d(&mut out, rng),
                Profile::Holistic3d => self.rotate_3d(&mut out, rng),
            }
        }
        if rng.gen::<f64>() < self.config.noise_prob {
            self.pose_noise(&mut out, rng);
        }
        if rng.gen::<f64>() < self.config.zoom_prob {
            let (lo, hi) = self.config.zoom_range;
            let scale = rng.gen_range(lo..hi);
            self.scale_all(&mut out, scale, scale);
        }
        if rng.gen::<f64>() < self.config.cut_prob {
            let (lo, hi) = self.config.cut_range;
            let threshold = rng.gen_range(lo..hi);
            self.zero_beyond(&mut out, threshold);
        }
        if rng.gen::<f64>() < self.config.aspect_prob {
            let (lo, hi) = self.config.aspect_range;
            let rx = rng.gen_range(lo..hi);
            let ry = rng.gen_range(lo..hi);
            self.scale_all(&mut out, rx, ry);
        }

        // Outlier suppression runs regardless of which augmentations fired.
        self.zero_beyond(&mut out, self.config.clamp_bound);

        out
    }

    /// Mirror the whole body left-right: negate x of pose and face, swap the
    /// hand identities, then negate x on both hands.
    fn mirror(&self, record: &mut KeypointRecord) {
        self.masked(&mut record.pose, negate_x);
        self.masked(&mut record.face, negate_x);
        std::mem::swap(&mut record.left_hand, &mut record.right_hand);
        self.masked(&mut record.left_hand, negate_x);
        self.masked(&mut record.right_hand, negate_x);
    }

    /// Add Gaussian noise to pose only, std scaled by the spread of the
    /// valid pose values.
    fn pose_noise<R: Rng + ?Sized>(&self, record: &mut KeypointRecord, rng: &mut R) {
        let sigma = valid_stddev(&record.pose, self.ignore_value) * rng.gen::<f32>()
            * self.config.noise_factor;
        if sigma <= 0.0 {
            return;
        }
        let mask = joint_mask(&record.pose, self.ignore_value);
        record.pose.mapv_inplace(|v| v + gaussian(&mut *rng) * sigma);
        apply_joint_mask(&mut record.pose, &mask, self.ignore_value);
    }

    /// Single in-plane rotation of all parts about the origin (2D profile).
    fn rotate_2d<R: Rng + ?Sized>(&self, record: &mut KeypointRecord, rng: &mut R) {
        let max = self.config.max_rotate_deg;
        let deg = rng.gen_range(-max..=max) as f32;
        let rad = deg.to_radians();
        let (sin, cos) = rad.sin_cos();

        for part in [
            &mut record.pose,
            &mut record.face,
            &mut record.left_hand,
            &mut record.right_hand,
        ] {
            self.masked(part, |p| {
                let (frames, joints, _dims) = p.dim();
                for f in 0..frames {
                    for j in 0..joints {
                        let x = p[[f, j, 0]];
                        let y = p[[f, j, 1]];
                        p[[f, j, 0]] = x * cos - y * sin;
                        p[[f, j, 1]] = x * sin + y * cos;
                    }
                }
            });
        }
    }

    /// Independent per-axis rotations about part root joints, plus
    /// per-finger-chain rotations for hands (3D profile).
    fn rotate_3d<R: Rng + ?Sized>(&self, record: &mut KeypointRecord, rng: &mut R) {
        let max = self.config.max_rotate_deg_3d;
        self.rotate_about_root(&mut record.pose, 0, max, rng);
        self.rotate_about_root(&mut record.face, 0, max, rng);
        self.rotate_about_root(&mut record.left_hand, HAND_CENTER_INDEX, max, rng);
        self.rotate_fingers(&mut record.left_hand, max, rng);
        self.rotate_about_root(&mut record.right_hand, HAND_CENTER_INDEX, max, rng);
        self.rotate_fingers(&mut record.right_hand, max, rng);
    }

    fn rotate_about_root<R: Rng + ?Sized>(
        &self,
        part: &mut Array3<f32>,
        root_idx: usize,
        max_deg: i32,
        rng: &mut R,
    ) {
        if part.iter().all(|&v| v == self.ignore_value) {
            return;
        }
        let m = random_rotation_matrix(max_deg, rng);

        self.masked(part, |p| {
            let (frames, joints, _dims) = p.dim();
            for f in 0..frames {
                let root = [p[[f, root_idx, 0]], p[[f, root_idx, 1]], p[[f, root_idx, 2]]];
                for j in 0..joints {
                    let v = [
                        p[[f, j, 0]] - root[0],
                        p[[f, j, 1]] - root[1],
                        p[[f, j, 2]] - root[2],
                    ];
                    let r = mat_apply(&m, v);
                    p[[f, j, 0]] = r[0] + root[0];
                    p[[f, j, 1]] = r[1] + root[1];
                    p[[f, j, 2]] = r[2] + root[2];
                }
            }
        });
    }

    /// Rotate each finger chain about its base joint independently.
    fn rotate_fingers<R: Rng + ?Sized>(&self, part: &mut Array3<f32>, max_deg: i32, rng: &mut R) {
        if part.iter().all(|&v| v == self.ignore_value) {
            return;
        }
        for chain in &FINGER_CHAINS {
            let m = random_rotation_matrix(max_deg, rng);
            self.masked(part, |p| {
                let frames = p.shape()[0];
                for f in 0..frames {
                    let base = chain[0];
                    let root = [p[[f, base, 0]], p[[f, base, 1]], p[[f, base, 2]]];
                    for &j in &chain[1..] {
                        let v = [
                            p[[f, j, 0]] - root[0],
                            p[[f, j, 1]] - root[1],
                            p[[f, j, 2]] - root[2],
                        ];
                        let r = mat_apply(&m, v);
                        p[[f, j, 0]] = r[0] + root[0];
                        p[[f, j, 1]] = r[1] + root[1];
                        p[[f, j, 2]] = r[2] + root[2];
                    }
                }
            });
        }
    }

    /// Multiply x by `rx` and y by `ry` across all parts (z untouched).
    fn scale_all(&self, record: &mut KeypointRecord, rx: f32, ry: f32) {
        for part in [
            &mut record.pose,
            &mut record.face,
            &mut record.left_hand,
            &mut record.right_hand,
        ] {
            self.masked(part, |p| {
                p.slice_mut(s![.., .., 0]).mapv_inplace(|v| v * rx);
                p.slice_mut(s![.., .., 1]).mapv_inplace(|v| v * ry);
            });
        }
    }

    /// Zero every valid joint whose absolute coordinate exceeds `bound` in
    /// any dimension. Sentinel joints are left alone.
    fn zero_beyond(&self, record: &mut KeypointRecord, bound: f32) {
        for part in [
            &mut record.pose,
            &mut record.face,
            &mut record.left_hand,
            &mut record.right_hand,
        ] {
            let mask = joint_mask(part, self.ignore_value);
            let (frames, joints, dims) = part.dim();
            for f in 0..frames {
                for j in 0..joints {
                    if !mask[[f, j]] {
                        continue;
                    }
                    let outlier = (0..dims).any(|d| part[[f, j, d]].abs() > bound);
                    if outlier {
                        for d in 0..dims {
                            part[[f, j, d]] = 0.0;
                        }
                    }
                }
            }
        }
    }

    /// Capture the validity mask, run `op`, restore sentinels.
    fn masked<F: FnOnce(&mut Array3<f32>)>(&self, part: &mut Array3<f32>, op: F) {
        let mask = joint_mask(part, self.ignore_value);
        op(part);
        apply_joint_mask(part, &mask, self.ignore_value);
    }
}

fn negate_x(part: &mut Array3<f32>) {
    part.slice_mut(s![.., .., 0]).mapv_inplace(|v| -v);
}

/// Standard deviation of the non-sentinel values in a part.
fn valid_stddev(part: &Array3<f32>, ignore_value: f32) -> f32 {
    let valid: Vec<f32> = part.iter().copied().filter(|&v| v != ignore_value).collect();
    if valid.len() < 2 {
        return 0.0;
    }
    let mean = valid.iter().sum::<f32>() / valid.len() as f32;
    let var = valid.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / valid.len() as f32;
    var.sqrt()
}

/// Standard normal draw via Box-Muller.
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1 = rng.gen::<f32>().max(1e-12);
    let u2 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

type Mat3 = [[f32; 3]; 3];

/// Rotation matrices with a random whole-degree angle per axis, composed
/// x then y then z.
fn random_rotation_matrix<R: Rng + ?Sized>(max_deg: i32, rng: &mut R) -> Mat3 {
    let rx = axis_rotation(0, rng.gen_range(-max_deg..=max_deg) as f32);
    let ry = axis_rotation(1, rng.gen_range(-max_deg..=max_deg) as f32);
    let rz = axis_rotation(2, rng.gen_range(-max_deg..=max_deg) as f32);
    mat_mul(&mat_mul(&rx, &ry), &rz)
}

fn axis_rotation(axis: usize, deg: f32) -> Mat3 {
    let (s, c) = deg.to_radians().sin_cos();
    match axis {
        0 => [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        1 => [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        _ => [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
    }
}

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn mat_apply(m: &Mat3, v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::IGNORE_VALUE;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_record(frames: usize) -> KeypointRecord {
        let fill = |joints: usize| {
            Array3::from_shape_fn((frames, joints, 3), |(f, j, d)| {
                ((f * 31 + j * 7 + d) % 13) as f32 * 0.03 - 0.18
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

    fn with_sentinels(mut record: KeypointRecord) -> KeypointRecord {
        for d in 0..3 {
            record.pose[[0, 3, d]] = IGNORE_VALUE;
            record.left_hand[[1, 8, d]] = IGNORE_VALUE;
        }
        record
    }

    fn all_on() -> Augmentor {
        let mut config = PipelineConfig::default();
        config.augment.mirror_prob = 1.0;
        config.augment.noise_prob = 1.0;
        config.augment.rotate_prob = 1.0;
        config.augment.zoom_prob = 1.0;
        config.augment.cut_prob = 1.0;
        config.augment.aspect_prob = 1.0;
        Augmentor::new(&config)
    }

    #[test]
    fn test_original_untouched() {
        let record = small_record(4);
        let copy = record.clone();
        let mut rng = StdRng::seed_from_u64(1);
        let _ = all_on().augment(&record, &mut rng);
        assert_eq!(record.pose, copy.pose);
        assert_eq!(record.right_hand, copy.right_hand);
    }

    #[test]
    fn test_mask_preserved_all_augmentations() {
        let record = with_sentinels(small_record(4));
        let augmentor = all_on();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = augmentor.augment(&record, &mut rng);
            for (before, after) in [
                (&record.pose, &out.pose),
                (&record.face, &out.face),
                (&record.left_hand, &out.left_hand),
                (&record.right_hand, &out.right_hand),
            ] {
                assert_eq!(
                    joint_mask(before, IGNORE_VALUE),
                    joint_mask(after, IGNORE_VALUE),
                    "seed {seed}"
                );
            }
        }
    }

    #[test]
    fn test_mask_preserved_when_disabled() {
        let record = with_sentinels(small_record(3));
        let mut config = PipelineConfig::default();
        config.augment.mirror_prob = 0.0;
        config.augment.noise_prob = 0.0;
        config.augment.rotate_prob = 0.0;
        config.augment.zoom_prob = 0.0;
        config.augment.cut_prob = 0.0;
        config.augment.aspect_prob = 0.0;
        let augmentor = Augmentor::new(&config);

        let mut rng = StdRng::seed_from_u64(2);
        let out = augmentor.augment(&record, &mut rng);
        assert_eq!(
            joint_mask(&record.pose, IGNORE_VALUE),
            joint_mask(&out.pose, IGNORE_VALUE)
        );
    }

    #[test]
    fn test_mirror_swaps_hands_and_negates_x() {
        let mut config = PipelineConfig::default();
        config.augment = AugmentConfig {
            mirror_prob: 1.0,
            noise_prob: 0.0,
            rotate_prob: 0.0,
            zoom_prob: 0.0,
            cut_prob: 0.0,
            aspect_prob: 0.0,
            clamp_bound: f32::MAX,
            ..AugmentConfig::default()
        };
        let augmentor = Augmentor::new(&config);

        let mut record = small_record(2);
        record.left_hand.fill(0.1);
        record.right_hand.fill(0.2);

        let mut rng = StdRng::seed_from_u64(0);
        let out = augmentor.augment(&record, &mut rng);

        // Hand identities swapped, x negated on both.
        assert!((out.left_hand[[0, 0, 0]] + 0.2).abs() < 1e-6);
        assert!((out.left_hand[[0, 0, 1]] - 0.2).abs() < 1e-6);
        assert!((out.right_hand[[0, 0, 0]] + 0.1).abs() < 1e-6);
        assert!((out.pose[[0, 0, 0]] + record.pose[[0, 0, 0]]).abs() < 1e-6);
        assert!((out.pose[[0, 0, 1]] - record.pose[[0, 0, 1]]).abs() < 1e-6);
    }

    #[test]
    fn test_final_clamp_zeroes_outliers() {
        let mut config = PipelineConfig::default();
        config.augment = AugmentConfig {
            mirror_prob: 0.0,
            noise_prob: 0.0,
            rotate_prob: 0.0,
            zoom_prob: 0.0,
            cut_prob: 0.0,
            aspect_prob: 0.0,
            ..AugmentConfig::default()
        };
        let augmentor = Augmentor::new(&config);

        let mut record = small_record(2);
        record.pose[[0, 2, 1]] = 3.0;
        for d in 0..3 {
            record.pose[[1, 5, d]] = IGNORE_VALUE;
        }

        let mut rng = StdRng::seed_from_u64(0);
        let out = augmentor.augment(&record, &mut rng);

        // Outlier joint zeroed in all dims.
        for d in 0..3 {
            assert_eq!(out.pose[[0, 2, d]], 0.0);
        }
        // Sentinel joint untouched despite |IGNORE_VALUE| exceeding the bound.
        for d in 0..3 {
            assert_eq!(out.pose[[1, 5, d]], IGNORE_VALUE);
        }
        // Small joints survive.
        assert_eq!(out.pose[[0, 0, 0]], record.pose[[0, 0, 0]]);
    }

    #[test]
    fn test_noise_touches_pose_only() {
        let mut config = PipelineConfig::default();
        config.augment = AugmentConfig {
            mirror_prob: 0.0,
            noise_prob: 1.0,
            rotate_prob: 0.0,
            zoom_prob: 0.0,
            cut_prob: 0.0,
            aspect_prob: 0.0,
            clamp_bound: f32::MAX,
            ..AugmentConfig::default()
        };
        let augmentor = Augmentor::new(&config);

        let record = small_record(3);
        let mut rng = StdRng::seed_from_u64(9);
        let out = augmentor.augment(&record, &mut rng);

        assert_ne!(out.pose, record.pose);
        assert_eq!(out.face, record.face);
        assert_eq!(out.left_hand, record.left_hand);
    }

    #[test]
    fn test_no_nan_after_augmentation() {
        let record = with_sentinels(small_record(4));
        let augmentor = all_on();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = augmentor.augment(&record, &mut rng);
            assert!(out.pose.iter().all(|v| v.is_finite()));
            assert!(out.face.iter().all(|v| v.is_finite()));
            assert!(out.left_hand.iter().all(|v| v.is_finite()));
            assert!(out.right_hand.iter().all(|v| v.is_finite()));
        }
    }
}
