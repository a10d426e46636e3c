// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Frame-at-a-time recognition pipeline.
//!
//! One [`Pipeline`] instance serves one video stream, synchronously:
//! buffer frames with [`Pipeline::update`], close the video with
//! [`Pipeline::finish_video`], then run the deterministic inference path
//! (filter, uniform resampling, normalization, embedding, KNN vote) over the
//! completed record. The randomized sampling and augmentation path exists
//! separately for producing training samples.

use ndarray::Array1;
use rand::Rng;

use crate::augment::Augmentor;
use crate::config::PipelineConfig;
use crate::embedder::{EmbeddingOutput, SequenceEmbedder};
use crate::error::{PipelineError, Result};
use crate::keypoints::{FrameKeypoints, KeypointRecord};
use crate::knn::KnnDatabase;
use crate::normalize::Normalizer;
use crate::sampling::{apply_resampling, SamplingStrategy};
use crate::visibility::VisibilityFilter;

// ===== Outcome =====

/// Result of closing out a buffered video.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Enough frames; the stacked record is ready for preprocessing.
    Processed(KeypointRecord),
    /// Recoverable: the video was dropped, the pipeline is ready for the next.
    Skipped(String),
    /// Structural failure while stacking; the buffer was discarded.
    Failed(PipelineError),
}

impl ProcessOutcome {
    /// The completed record, if this outcome carries one.
    #[must_use]
    pub fn record(self) -> Option<KeypointRecord> {
        match self {
            Self::Processed(record) => Some(record),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }
}

// ===== Pipeline =====

/// Owns the per-video frame history and the processing stages.
pub struct Pipeline {
    config: PipelineConfig,
    filter: VisibilityFilter,
    normalizer: Normalizer,
    augmentor: Augmentor,
    frames: Vec<FrameKeypoints>,
    embedder: Option<Box<dyn SequenceEmbedder>>,
    database: Option<KnnDatabase>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("buffered_frames", &self.frames.len())
            .field("has_embedder", &self.embedder.is_some())
            .field("has_database", &self.database.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when the configuration is
    /// inconsistent.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let filter = VisibilityFilter::new(&config);
        let normalizer = Normalizer::new(&config);
        let augmentor = Augmentor::new(&config);
        Ok(Self {
            config,
            filter,
            normalizer,
            augmentor,
            frames: Vec::new(),
            embedder: None,
            database: None,
        })
    }

    /// Attach the embedding model.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Box<dyn SequenceEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach the KNN feature database.
    #[must_use]
    pub fn with_database(mut self, database: KnnDatabase) -> Self {
        self.database = Some(database);
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    /// Feed one frame of raw keypoints.
    ///
    /// A frame with no detected person is skipped entirely (returns `false`)
    /// rather than buffered as a gap.
    ///
    /// # Errors
    ///
    /// Returns a structural error on malformed part shapes; the buffer is
    /// left untouched.
    pub fn update(&mut self, frame: FrameKeypoints) -> Result<bool> {
        frame.validate()?;
        if frame.is_person_missing() {
            return Ok(false);
        }
        self.frames.push(frame);
        Ok(true)
    }

    /// Drop the in-progress buffer (frame acquisition failed or the stream
    /// was cancelled).
    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Close out the current video. The buffer is cleared in every case.
    pub fn finish_video(&mut self) -> ProcessOutcome {
        if self.frames.len() <= self.config.min_video_frames {
            let reason = format!(
                "video too short ({} frames, need > {})",
                self.frames.len(),
                self.config.min_video_frames
            );
            self.frames.clear();
            return ProcessOutcome::Skipped(reason);
        }

        let stacked = KeypointRecord::from_frames(&self.frames);
        self.frames.clear();
        match stacked {
            Ok(record) => ProcessOutcome::Processed(record),
            Err(e) => ProcessOutcome::Failed(e),
        }
    }

    /// Deterministic inference preprocessing: visibility filter, uniform
    /// resampling to `sample_frames`, normalization.
    ///
    /// # Errors
    ///
    /// Returns a structural error on malformed records or sequences too
    /// short to resample.
    pub fn preprocess(&self, record: KeypointRecord) -> Result<KeypointRecord> {
        if record.frame_count < 2 {
            return Err(PipelineError::StructuralError(format!(
                "cannot resample a {}-frame sequence",
                record.frame_count
            )));
        }
        let filtered = self.filter.filter(record)?;
        let indices = crate::sampling::uniform_sampling(
            filtered.frame_count,
            self.config.sample_frames,
        );
        let sampled = apply_resampling(&filtered, &indices);
        let (normalized, _transform) = self.normalizer.normalize(sampled)?;
        Ok(normalized)
    }

    /// Embed an already-preprocessed record.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when no embedder is attached,
    /// or the embedder's own failure.
    pub fn extract_features(&mut self, record: &KeypointRecord) -> Result<EmbeddingOutput> {
        let embedder = self.embedder.as_mut().ok_or_else(|| {
            PipelineError::ConfigError("no embedding model attached to the pipeline".to_string())
        })?;
        embedder.embed(record)
    }

    /// Full inference path for one completed video: preprocess, embed, vote.
    ///
    /// Returns `Ok(None)` when the database is absent or empty: that is an
    /// insufficient-data condition, not a failure.
    ///
    /// # Errors
    ///
    /// Returns preprocessing or inference errors.
    pub fn classify(&mut self, record: KeypointRecord) -> Result<Option<String>> {
        let normalized = self.preprocess(record)?;
        let output = self.extract_features(&normalized)?;

        let Some(database) = self.database.as_ref() else {
            crate::warn!("No feature database attached, cannot classify.");
            return Ok(None);
        };
        if database.is_empty() {
            crate::warn!("Feature database is empty, cannot classify.");
            return Ok(None);
        }
        database.classify(output.embedding.view(), self.config.knn_k)
    }

    /// One randomized training sample: filter, random frame sampling,
    /// geometric augmentation. Normalization is left to the consumer so the
    /// sample can also be exported raw.
    ///
    /// # Errors
    ///
    /// Returns structural errors from filtering.
    pub fn training_sample<R: Rng + ?Sized>(
        &self,
        record: &KeypointRecord,
        rng: &mut R,
    ) -> Result<KeypointRecord> {
        let filtered = self.filter.filter(record.clone())?;
        let indices = SamplingStrategy::Random.sample_indices(
            filtered.frame_count,
            self.config.sample_frames,
            rng,
        );
        let sampled = apply_resampling(&filtered, &indices);
        Ok(self.augmentor.augment(&sampled, rng))
    }

    /// Embed one training sample after normalization, for feature export.
    ///
    /// # Errors
    ///
    /// Returns normalization or inference errors.
    pub fn extract_training_features<R: Rng + ?Sized>(
        &mut self,
        record: &KeypointRecord,
        rng: &mut R,
    ) -> Result<Array1<f32>> {
        let sample = self.training_sample(record, rng)?;
        let (normalized, _transform) = self.normalizer.normalize(sample)?;
        let output = self.extract_features(&normalized)?;
        Ok(output.embedding)
    }
}
