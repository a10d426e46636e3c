// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Sequence embedding through an ONNX classifier model.
//!
//! The pipeline hands a normalized [`KeypointRecord`] to a
//! [`SequenceEmbedder`]; the default implementation wraps an ONNX Runtime
//! session over a model exported with four sequence inputs (pose, face, left
//! hand, right hand) and two outputs (feature embedding, class logits).

use std::path::Path;

use ndarray::{Array1, Array4, Axis};
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::{PipelineError, Result};
use crate::keypoints::KeypointRecord;

// ===== Output =====

/// What the classifier model produces for one sequence.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// Fixed-length feature vector, L2-normalized.
    pub embedding: Array1<f32>,
    /// Raw per-class logits.
    pub logits: Array1<f32>,
}

impl EmbeddingOutput {
    /// Index of the highest logit, if any.
    #[must_use]
    pub fn top_class(&self) -> Option<usize> {
        self.logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

// ===== Trait =====

/// Anything that can turn a normalized sequence into an embedding.
pub trait SequenceEmbedder {
    /// Embed one normalized video sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or inference fails.
    fn embed(&mut self, record: &KeypointRecord) -> Result<EmbeddingOutput>;
}

// ===== ONNX implementation =====

/// Number of threads used within individual operators.
const INTRA_THREADS: usize = 2;

/// ONNX Runtime backed sequence embedder.
pub struct OnnxEmbedder {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("input_names", &self.input_names)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbedder {
    /// Load the classifier model from an ONNX file.
    ///
    /// The model is expected to take the four part sequences in order
    /// (pose, face, left hand, right hand) and to emit the embedding as its
    /// first output and the class logits as its second.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ModelLoadError`] if the file is missing, is
    /// not a loadable model, or does not expose four inputs and two outputs.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| {
                PipelineError::ModelLoadError(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PipelineError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(INTRA_THREADS)
            .map_err(|e| {
                PipelineError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| PipelineError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let input_names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        if input_names.len() != 4 {
            return Err(PipelineError::ModelLoadError(format!(
                "Expected 4 model inputs (pose, face, left hand, right hand), found {}",
                input_names.len()
            )));
        }
        if output_names.len() != 2 {
            return Err(PipelineError::ModelLoadError(format!(
                "Expected 2 model outputs (embedding, logits), found {}",
                output_names.len()
            )));
        }

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    fn extract_output(output: &ort::value::Value, name: &str) -> Result<Array1<f32>> {
        let (_, data) = output.try_extract_tensor::<f32>().map_err(|e| {
            PipelineError::InferenceError(format!("Failed to extract output '{name}': {e}"))
        })?;
        Ok(Array1::from_vec(data.to_vec()))
    }
}

impl SequenceEmbedder for OnnxEmbedder {
    fn embed(&mut self, record: &KeypointRecord) -> Result<EmbeddingOutput> {
        record.validate()?;

        // Batch axis in front of every part sequence.
        let pose: Array4<f32> = record.pose.clone().insert_axis(Axis(0));
        let face: Array4<f32> = record.face.clone().insert_axis(Axis(0));
        let left: Array4<f32> = record.left_hand.clone().insert_axis(Axis(0));
        let right: Array4<f32> = record.right_hand.clone().insert_axis(Axis(0));

        let pose_view = pose.as_standard_layout();
        let face_view = face.as_standard_layout();
        let left_view = left.as_standard_layout();
        let right_view = right.as_standard_layout();

        let pose_tensor = TensorRef::from_array_view(&pose_view)
            .map_err(|e| PipelineError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        let face_tensor = TensorRef::from_array_view(&face_view)
            .map_err(|e| PipelineError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        let left_tensor = TensorRef::from_array_view(&left_view)
            .map_err(|e| PipelineError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        let right_tensor = TensorRef::from_array_view(&right_view)
            .map_err(|e| PipelineError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let inputs = ort::inputs![
            &self.input_names[0] => pose_tensor,
            &self.input_names[1] => face_tensor,
            &self.input_names[2] => left_tensor,
            &self.input_names[3] => right_tensor,
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| PipelineError::InferenceError(format!("Inference failed: {e}")))?;

        let embedding_value = outputs.get(self.output_names[0].as_str()).ok_or_else(|| {
            PipelineError::InferenceError(format!("Output '{}' not found", self.output_names[0]))
        })?;
        let logits_value = outputs.get(self.output_names[1].as_str()).ok_or_else(|| {
            PipelineError::InferenceError(format!("Output '{}' not found", self.output_names[1]))
        })?;

        let mut embedding = Self::extract_output(embedding_value, &self.output_names[0])?;
        let logits = Self::extract_output(logits_value, &self.output_names[1])?;
        l2_normalize(&mut embedding);

        Ok(EmbeddingOutput { embedding, logits })
    }
}

/// Scale a vector to unit Euclidean length in place.
///
/// A zero vector stays zero rather than turning into NaN.
pub fn l2_normalize(v: &mut Array1<f32>) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.mapv_inplace(|x| x / norm);
    }
}
