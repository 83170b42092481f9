pub mod adapter;
pub mod fallback;
pub mod labels;
pub mod network;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imaging::{Bitmap, Tensor};

pub use adapter::{ClassifierAdapter, ModelState};
pub use fallback::FallbackPredictor;
pub use labels::{ClassLabels, TumorKind, NUM_CLASSES};
pub use network::{Activation, DenseNetwork, ModelLoadError};

/// One probability per class index, summing to ~1.
pub type Probabilities = Vec<f64>;

/// Which strategy produced a probability vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Fallback,
}

impl PredictionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionSource::Model    => "model",
            PredictionSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Input tensor has {actual} values, model expects {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("Model produced {actual} outputs, expected {expected}")]
    OutputArity { expected: usize, actual: usize },

    #[error("Model produced an invalid probability vector: {0}")]
    InvalidOutput(String),
}

/// Everything a classifier may look at for one image.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub bitmap: &'a Bitmap,
    pub tensor: &'a Tensor,
}

/// A strategy mapping a sample to class probabilities.
pub trait Classifier: Send + Sync {
    fn source(&self) -> PredictionSource;

    fn classify(&self, sample: &Sample<'_>) -> Result<Probabilities, ClassifyError>;

    /// Why this classifier cannot serve requests, if it cannot.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }
}

/// How far a probability vector's sum may stray from 1.
const SUM_TOLERANCE: f64 = 1e-4;

/// Requires one entry per class, each in [0, 1], summing to 1.
pub(crate) fn check_probabilities(probs: &[f64], expected: usize) -> Result<(), ClassifyError> {
    if probs.len() != expected {
        return Err(ClassifyError::OutputArity { expected, actual: probs.len() });
    }
    if let Some(bad) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(ClassifyError::InvalidOutput(format!("entry {bad}")));
    }
    let total: f64 = probs.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(ClassifyError::InvalidOutput(format!("entries sum to {total}")));
    }
    Ok(())
}
