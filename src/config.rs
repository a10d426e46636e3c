// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Pipeline configuration.
//!
//! This module defines the [`PipelineConfig`] struct, an explicit immutable
//! configuration constructed once at startup and passed into each component's
//! constructor. No component reads ambient global state.

use std::fmt;
use std::str::FromStr;

/// Pipeline profile: which keypoint lineage the pipeline runs.
///
/// The two profiles share one normalizer/augmentor interface and differ in the
/// geometry dimensionality and rotation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// 2D keypoints; rotation augments with a single in-plane angle.
    Pose2d,
    /// 3D holistic keypoints; rotation augments per axis about part roots,
    /// with extra per-finger-chain rotations for hands.
    Holistic3d,
}

impl Profile {
    /// String form used in CLI arguments and config files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pose2d => "pose2d",
            Self::Holistic3d => "holistic3d",
        }
    }

}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pose2d" | "2d" => Ok(Self::Pose2d),
            "holistic3d" | "3d" => Ok(Self::Holistic3d),
            other => Err(format!("unknown profile: {other}")),
        }
    }
}

/// Randomized augmentation probabilities and ranges.
///
/// Fixed design constants; tests override individual probabilities to 0.0 or
/// 1.0 to pin down single augmentations.
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    /// Probability of mirroring the whole body left-right.
    pub mirror_prob: f64,
    /// Probability of additive Gaussian noise on pose.
    pub noise_prob: f64,
    /// Noise std factor, scaled by the pose value stddev and a uniform draw.
    pub noise_factor: f32,
    /// Probability of random rotation.
    pub rotate_prob: f64,
    /// Maximum in-plane rotation in whole degrees (2D profile).
    pub max_rotate_deg: i32,
    /// Maximum per-axis rotation in whole degrees (3D profile).
    pub max_rotate_deg_3d: i32,
    /// Probability of a shared zoom.
    pub zoom_prob: f64,
    /// Zoom range `[low, high)`.
    pub zoom_range: (f32, f32),
    /// Probability of the center cut.
    pub cut_prob: f64,
    /// Cut threshold range `[low, high)`.
    pub cut_range: (f32, f32),
    /// Probability of aspect-ratio distortion.
    pub aspect_prob: f64,
    /// Aspect ratio range `[low, high)` per axis.
    pub aspect_range: (f32, f32),
    /// Unconditional absolute-value bound; joints beyond it are zeroed.
    pub clamp_bound: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            mirror_prob: 0.5,
            noise_prob: 0.5,
            noise_factor: 0.07,
            rotate_prob: 0.5,
            max_rotate_deg: 20,
            max_rotate_deg_3d: 10,
            zoom_prob: 0.75,
            zoom_range: (0.8, 2.8),
            cut_prob: 0.75,
            cut_range: (0.6, 0.93),
            aspect_prob: 0.5,
            aspect_range: (0.75, 1.25),
            clamp_bound: 0.5,
        }
    }
}

/// Configuration for the sign recognition pipeline.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use sign_inference::{PipelineConfig, Profile};
///
/// let config = PipelineConfig::new()
///     .with_profile(Profile::Holistic3d)
///     .with_sample_frames(16)
///     .with_knn_k(5);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Which keypoint lineage to run.
    pub profile: Profile,
    /// Frames sampled from each video before embedding.
    pub sample_frames: usize,
    /// Videos at or below this frame count are dropped.
    pub min_video_frames: usize,
    /// Pose visibility below this marks a hand absent.
    pub hand_visibility_threshold: f32,
    /// Sentinel for missing joints.
    pub ignore_value: f32,
    /// Neighbors consulted by the KNN vote.
    pub knn_k: usize,
    /// Decimal digits written to KNN database rows.
    pub knn_precision: usize,
    /// Pose joint indices selected from the full detector output.
    pub selected_pose_joints: Vec<usize>,
    /// Face landmark indices selected from the full face-mesh output.
    pub selected_face_joints: Vec<usize>,
    /// Augmentation constants (training only).
    pub augment: AugmentConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Holistic3d,
            sample_frames: 16,
            min_video_frames: 12,
            hand_visibility_threshold: 0.35,
            ignore_value: crate::keypoints::IGNORE_VALUE,
            knn_k: 5,
            knn_precision: crate::knn::DEFAULT_PRECISION,
            selected_pose_joints: vec![0, 2, 5, 7, 8, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            selected_face_joints: vec![
                78, 191, 80, 13, 310, 415, 308, 324, 318, 14, 88, 95, 107, 69, 105, 52, 159, 145,
                336, 299, 334, 282, 386, 374, 10,
            ],
            augment: AugmentConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pipeline profile.
    #[must_use]
    pub const fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Set how many frames to sample from each video.
    #[must_use]
    pub const fn with_sample_frames(mut self, frames: usize) -> Self {
        self.sample_frames = frames;
        self
    }

    /// Set the minimum frames a video must exceed to be kept.
    #[must_use]
    pub const fn with_min_video_frames(mut self, frames: usize) -> Self {
        self.min_video_frames = frames;
        self
    }

    /// Set the hand visibility threshold.
    #[must_use]
    pub const fn with_hand_visibility_threshold(mut self, threshold: f32) -> Self {
        self.hand_visibility_threshold = threshold;
        self
    }

    /// Set the number of neighbors for the KNN vote.
    #[must_use]
    pub const fn with_knn_k(mut self, k: usize) -> Self {
        self.knn_k = k;
        self
    }

    /// Set the augmentation constants.
    #[must_use]
    pub fn with_augment(mut self, augment: AugmentConfig) -> Self {
        self.augment = augment;
        self
    }

    /// Validate ranges and index lists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::ConfigError`] on out-of-range values.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::PipelineError;

        if self.sample_frames == 0 {
            return Err(PipelineError::ConfigError(
                "sample_frames must be positive".to_string(),
            ));
        }
        if self.min_video_frames == 0 {
            return Err(PipelineError::ConfigError(
                "min_video_frames must be positive".to_string(),
            ));
        }
        if self.selected_pose_joints.len() != crate::keypoints::NUM_POSE_JOINTS {
            return Err(PipelineError::ConfigError(format!(
                "expected {} selected pose joints, got {}",
                crate::keypoints::NUM_POSE_JOINTS,
                self.selected_pose_joints.len()
            )));
        }
        if self.selected_face_joints.len() != crate::keypoints::NUM_FACE_JOINTS {
            return Err(PipelineError::ConfigError(format!(
                "expected {} selected face joints, got {}",
                crate::keypoints::NUM_FACE_JOINTS,
                self.selected_face_joints.len()
            )));
        }
        Ok(())
    }
}
