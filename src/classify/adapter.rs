use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::classify::network::{Activation, DenseNetwork, ModelLoadError};
use crate::classify::{check_probabilities, Classifier, ClassifyError, PredictionSource, Probabilities, Sample};
use crate::imaging::preprocess::TENSOR_CHANNELS;
use crate::imaging::Tensor;

/// Outcome of the one-time model load.
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<DenseNetwork>),
    Unavailable { reason: String },
}

/// Lazily loads the model artifact on first use and serves it to every
/// caller afterwards.
///
/// The load happens at most once per adapter even under concurrent first
/// access. A failed load is remembered: the adapter stays `Unavailable`
/// until the process restarts.
#[derive(Debug)]
pub struct ClassifierAdapter {
    path:        PathBuf,
    input_side:  u32,
    num_classes: usize,
    state:       OnceLock<ModelState>,
}

impl ClassifierAdapter {
    pub fn new(path: impl Into<PathBuf>, input_side: u32, num_classes: usize) -> Self {
        ClassifierAdapter {
            path: path.into(),
            input_side,
            num_classes,
            state: OnceLock::new(),
        }
    }

    /// Loads the model if this is the first call.
    pub fn state(&self) -> &ModelState {
        self.state.get_or_init(|| match self.load() {
            Ok(network) => {
                info!(
                    path = %self.path.display(),
                    name = %network.name,
                    layers = network.layers.len(),
                    "model loaded"
                );
                ModelState::Ready(Arc::new(network))
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "model unavailable, predictions will use the fallback");
                ModelState::Unavailable { reason: e.to_string() }
            }
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state(), ModelState::Ready(_))
    }

    /// Why the model could not be loaded, if it could not.
    pub fn model_error(&self) -> Option<&str> {
        match self.state() {
            ModelState::Ready(_) => None,
            ModelState::Unavailable { reason } => Some(reason),
        }
    }

    /// Runs the network over a preprocessed tensor.
    pub fn classify_tensor(&self, tensor: &Tensor) -> Result<Probabilities, ClassifyError> {
        let network = match self.state() {
            ModelState::Ready(network) => network,
            ModelState::Unavailable { reason } => {
                return Err(ClassifyError::Unavailable(reason.clone()));
            }
        };

        let expected = network.input.len();
        if tensor.len() != expected {
            return Err(ClassifyError::InputShape { expected, actual: tensor.len() });
        }
        let input: Vec<f64> = tensor.as_slice().iter().map(|&v| v as f64).collect();
        let probs = network.forward(&input);
        check_probabilities(&probs, self.num_classes)?;
        Ok(probs)
    }

    fn load(&self) -> Result<DenseNetwork, ModelLoadError> {
        let network = DenseNetwork::load_json(&self.path)?;

        let input = network.input;
        if input.width != self.input_side
            || input.height != self.input_side
            || input.channels as usize != TENSOR_CHANNELS
        {
            return Err(ModelLoadError::Shape(format!(
                "model input is {}x{}x{}, pipeline produces {side}x{side}x{TENSOR_CHANNELS}",
                input.width,
                input.height,
                input.channels,
                side = self.input_side
            )));
        }
        if network.output_size() != self.num_classes {
            return Err(ModelLoadError::Shape(format!(
                "model has {} outputs, expected {}",
                network.output_size(),
                self.num_classes
            )));
        }
        if network.output_activation() != Some(&Activation::Softmax) {
            return Err(ModelLoadError::Shape("final layer must use Softmax".into()));
        }
        Ok(network)
    }
}

impl Classifier for ClassifierAdapter {
    fn source(&self) -> PredictionSource { PredictionSource::Model }

    fn classify(&self, sample: &Sample<'_>) -> Result<Probabilities, ClassifyError> {
        self.classify_tensor(sample.tensor)
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.model_error().map(str::to_owned)
    }
}
