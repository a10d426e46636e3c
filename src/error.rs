// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Error types for the sign recognition pipeline.

use std::fmt;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the sign recognition pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Structural integrity violation (mismatched frame counts, wrong joint
    /// shape, missing confidence channel). Aborts the current video only.
    StructuralError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Error loading the ONNX embedding model.
    ModelLoadError(String),
    /// Error during model inference.
    InferenceError(String),
    /// KNN database error (unreadable rows, mixed dimensionality).
    DatabaseError(String),
    /// Skeleton dataset (de)serialization error.
    SerializationError(String),
    /// IO error with context message.
    IoError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuralError(msg) => write!(f, "Structural error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
