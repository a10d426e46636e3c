// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Temporal sampling: reduce a variable-length frame sequence to a fixed
//! count of frame indices.
//!
//! All strategies return exactly `pick` ascending indices inside
//! `[0, total)`. Sequences at or below the minimum-frame threshold are
//! rejected upstream and never reach the sampler.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use ndarray::Axis;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::keypoints::KeypointRecord;

// ================================================================================================
// Constants
// ================================================================================================

/// Retained-fraction range for the clipped variants.
const CLIP_RANGE: (f64, f64) = (0.6, 0.9);

/// Center toward which the clipped start-offset is biased.
const CLIP_CENTER: f64 = 0.55;

/// Reciprocal of Beta(2.5, 3): `1 / B(2.5, 3) = 315 / 16`.
const BETA_PDF_NORM: f64 = 315.0 / 16.0;

/// Floor added to beta weights so edge frames keep nonzero mass.
const BETA_EPSILON: f64 = 1e-5;

// ================================================================================================
// Strategies
// ================================================================================================

/// Frame-index selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// Deterministic, evenly spaced indices.
    Uniform,
    /// Unique indices drawn uniformly without replacement, sorted.
    Random,
    /// Indices weighted by a Beta(2.5, 3) density over normalized position.
    Beta,
    /// Uniform applied to a random retained window, shifted by its offset.
    ClippedUniform,
    /// Random applied to a random retained window, shifted by its offset.
    ClippedRandom,
    /// Beta applied to a random retained window, shifted by its offset.
    ClippedBeta,
}

impl SamplingStrategy {
    /// Produce `pick` ordered frame indices into `[0, total)`.
    ///
    /// # Panics
    ///
    /// Panics if `total` or `pick` is zero; callers reject short sequences
    /// before sampling.
    #[must_use]
    pub fn sample_indices<R: Rng + ?Sized>(
        self,
        total: usize,
        pick: usize,
        rng: &mut R,
    ) -> Vec<usize> {
        assert!(total > 0 && pick > 0, "sampler requires non-empty input");
        match self {
            Self::Uniform => uniform_sampling(total, pick),
            Self::Random => random_sampling(total, pick, rng),
            Self::Beta => beta_sampling(total, pick, rng),
            Self::ClippedUniform => clipped(total, pick, rng, |n, p, _| uniform_sampling(n, p)),
            Self::ClippedRandom => clipped(total, pick, rng, random_sampling),
            Self::ClippedBeta => clipped(total, pick, rng, beta_sampling),
        }
    }
}

/// Evenly spaced indices: `tick = (total - 2) / pick`,
/// `idx_i = floor(tick / 2 + tick * i) + 1`. Reproducible for equal inputs.
#[must_use]
pub fn uniform_sampling(total: usize, pick: usize) -> Vec<usize> {
    let tick = (total as f64 - 2.0) / pick as f64;
    (0..pick)
        .map(|i| (tick / 2.0 + tick * i as f64) as usize + 1)
        .collect()
}

/// Unique uniform indices without replacement, sorted ascending. If `total`
/// is smaller than `pick`, the tail is padded with the last sampled index.
#[must_use]
pub fn random_sampling<R: Rng + ?Sized>(total: usize, pick: usize, rng: &mut R) -> Vec<usize> {
    let mut all: Vec<usize> = (0..total).collect();
    all.shuffle(rng);
    all.truncate(pick);
    all.sort_unstable();

    if all.len() < pick {
        let last = *all.last().expect("total > 0");
        all.resize(pick, last);
    }
    all
}

/// Beta(2.5, 3)-weighted indices over normalized frame position, sorted.
/// Sampling is without replacement unless `total < pick`.
#[must_use]
pub fn beta_sampling<R: Rng + ?Sized>(total: usize, pick: usize, rng: &mut R) -> Vec<usize> {
    let mut weights: Vec<f64> = (0..total)
        .map(|i| beta_pdf(i as f64 / total as f64) + BETA_EPSILON)
        .collect();

    let with_replacement = total < pick;
    let mut picked = Vec::with_capacity(pick);
    for _ in 0..pick {
        let idx = weighted_draw(&weights, rng);
        picked.push(idx);
        if !with_replacement {
            weights[idx] = 0.0;
        }
    }
    picked.sort_unstable();
    picked
}

/// Beta(2.5, 3) probability density at `x` in `[0, 1)`.
fn beta_pdf(x: f64) -> f64 {
    x.powf(1.5) * (1.0 - x).powi(2) * BETA_PDF_NORM
}

/// Draw one index proportionally to `weights`.
fn weighted_draw<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let sum: f64 = weights.iter().sum();
    let mut target = rng.gen::<f64>() * sum;
    for (i, &w) in weights.iter().enumerate() {
        target -= w;
        if target <= 0.0 && w > 0.0 {
            return i;
        }
    }
    // Float round-off: fall back to the last positive weight.
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .expect("at least one positive weight")
}

/// Random retained fraction and start offset for the clipped variants.
fn clip_params<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let (a, b) = CLIP_RANGE;
    let clip_fraction = a + rng.gen::<f64>() * (b - a);
    let shift_offset = a / 2.0 + rng.gen::<f64>() * (CLIP_CENTER - a / 2.0);
    (clip_fraction, shift_offset)
}

/// Apply a base strategy to a randomly clipped window and shift the indices.
fn clipped<R, F>(total: usize, pick: usize, rng: &mut R, base: F) -> Vec<usize>
where
    R: Rng + ?Sized,
    F: Fn(usize, usize, &mut R) -> Vec<usize>,
{
    let (clip_fraction, shift_offset) = clip_params(rng);
    let clipped_total = ((total as f64 * clip_fraction) as usize).max(1);
    let start = ((total - clipped_total) as f64 * shift_offset) as usize;

    base(clipped_total, pick, rng)
        .into_iter()
        .map(|i| i + start)
        .collect()
}

// ================================================================================================
// Resampling
// ================================================================================================

/// Index all four part arrays of a record by `indices`, producing a record
/// with `indices.len()` frames.
///
/// # Panics
///
/// Panics if any index is out of range; the sampler guarantees validity.
#[must_use]
pub fn apply_resampling(record: &KeypointRecord, indices: &[usize]) -> KeypointRecord {
    let pick = |arr: &ndarray::Array3<f32>| arr.select(Axis(0), indices);
    KeypointRecord {
        pose: pick(&record.pose),
        face: pick(&record.face),
        left_hand: pick(&record.left_hand),
        right_hand: pick(&record.right_hand),
        frame_count: indices.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::FrameKeypoints;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_uniform_bounds_and_monotonicity() {
        for total in 13..200 {
            let indices = uniform_sampling(total, 16);
            assert_eq!(indices.len(), 16);
            assert!(indices.windows(2).all(|w| w[0] <= w[1]));
            assert!(indices.iter().all(|&i| i < total));
        }
    }

    #[test]
    fn test_uniform_deterministic() {
        assert_eq!(uniform_sampling(60, 16), uniform_sampling(60, 16));
    }

    #[test]
    fn test_random_count_and_order() {
        let mut r = rng(7);
        for total in [13, 40, 100] {
            let indices = random_sampling(total, 16, &mut r);
            assert_eq!(indices.len(), 16);
            assert!(indices.windows(2).all(|w| w[0] <= w[1]));
            assert!(indices.iter().all(|&i| i < total));
        }
    }

    #[test]
    fn test_random_padding_law() {
        let mut r = rng(3);
        let indices = random_sampling(5, 16, &mut r);
        assert_eq!(indices.len(), 16);
        let last_unique = indices[4];
        assert!(indices[5..].iter().all(|&i| i == last_unique));
    }

    #[test]
    fn test_beta_without_replacement_is_unique() {
        let mut r = rng(11);
        let indices = beta_sampling(100, 16, &mut r);
        assert_eq!(indices.len(), 16);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_beta_with_replacement_when_short() {
        let mut r = rng(5);
        let indices = beta_sampling(8, 16, &mut r);
        assert_eq!(indices.len(), 16);
        assert!(indices.iter().all(|&i| i < 8));
    }

    #[test]
    fn test_beta_pdf_shape() {
        // Mode of Beta(2.5, 3) sits at (a-1)/(a+b-2) = 3/7.
        let mode = beta_pdf(3.0 / 7.0);
        assert!(mode > beta_pdf(0.1));
        assert!(mode > beta_pdf(0.9));
        assert!((beta_pdf(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_clipped_variants_stay_in_range() {
        let mut r = rng(17);
        for strategy in [
            SamplingStrategy::ClippedUniform,
            SamplingStrategy::ClippedRandom,
            SamplingStrategy::ClippedBeta,
        ] {
            for total in [20, 64, 300] {
                let indices = strategy.sample_indices(total, 16, &mut r);
                assert_eq!(indices.len(), 16);
                assert!(indices.iter().all(|&i| i < total), "{strategy:?} {total}");
            }
        }
    }

    #[test]
    fn test_apply_resampling_shapes() {
        let record =
            KeypointRecord::from_frames(&vec![FrameKeypoints::empty(); 20]).unwrap();
        let indices = uniform_sampling(20, 16);
        let resampled = apply_resampling(&record, &indices);

        assert_eq!(resampled.frame_count, 16);
        assert_eq!(resampled.pose.shape()[0], 16);
        assert_eq!(resampled.face.shape()[0], 16);
        assert_eq!(resampled.left_hand.shape()[0], 16);
        assert_eq!(resampled.right_hand.shape()[0], 16);
        assert!(resampled.validate().is_ok());
    }
}
