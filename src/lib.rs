// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

#![allow(clippy::multiple_crate_versions)]

//! # Sign Inference Library
//!
//! Real-time sign-language recognition pipeline written in Rust: holistic
//! keypoint sequences in, class labels out.
//!
//! One video at a time, the pipeline filters unreliable joints behind a
//! sentinel mask, resamples the sequence to a fixed frame count, normalizes
//! each body part into its own translation/scale invariant frame, embeds the
//! result through an ONNX classifier model, and votes over a KNN feature
//! database. Randomized sampling and geometric augmentation produce training
//! variety from small recorded datasets.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use sign_inference::{KnnDatabase, OnnxEmbedder, Pipeline, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let embedder = OnnxEmbedder::load("classifier.onnx")?;
//!     let database = KnnDatabase::load_dir("knn_db")?;
//!     let mut pipeline = Pipeline::new(PipelineConfig::default())?
//!         .with_embedder(Box::new(embedder))
//!         .with_database(database);
//!
//!     let videos = sign_inference::store::load_file("session.json")?;
//!     for video in videos {
//!         match pipeline.classify(video)? {
//!             Some(label) => println!("{label}"),
//!             None => println!("no result"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Append augmented feature rows for one class to a KNN database
//! sign-inference extract --dataset hello.json --model classifier.onnx --label hello --output knn_db
//!
//! # Classify recorded videos
//! sign-inference classify --dataset session.json --model classifier.onnx --database knn_db
//!
//! # Inspect a dataset file
//! sign-inference info --dataset hello.json
//! ```

// Modules
pub mod augment;
pub mod cli;
pub mod config;
pub mod detector;
pub mod embedder;
pub mod error;
pub mod keypoints;
pub mod knn;
pub mod labels;
pub mod normalize;
pub mod pipeline;
pub mod sampling;
pub mod store;
pub mod visibility;

// Re-export main types
pub use augment::Augmentor;
pub use config::{AugmentConfig, PipelineConfig, Profile};
pub use detector::{KeypointDetector, RawDetection};
pub use embedder::{EmbeddingOutput, OnnxEmbedder, SequenceEmbedder};
pub use error::{PipelineError, Result};
pub use keypoints::{FrameKeypoints, KeypointRecord, IGNORE_VALUE};
pub use knn::KnnDatabase;
pub use labels::LabelRegistry;
pub use normalize::{Normalizer, RecordTransform};
pub use pipeline::{Pipeline, ProcessOutcome};
pub use sampling::SamplingStrategy;
pub use store::SkeletonStore;
pub use visibility::VisibilityFilter;

/// Library version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }
}
