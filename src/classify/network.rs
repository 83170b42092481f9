use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Cannot open model '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model: {0}")]
    Shape(String),
}

/// Activation applied after a layer's affine transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    ReLU,
    Identity,
    /// Vector-valued; applied over the whole layer output in `DenseLayer::forward`.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl Activation {
    /// Element-wise activation. `Softmax` is the identity here; the layer
    /// normalises the whole vector afterwards.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::ReLU => if x > 0.0 { x } else { 0.0 },
            Activation::Identity | Activation::Softmax => x,
            Activation::Tanh => x.tanh(),
            Activation::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }
}

/// Numerically stable softmax (max-shifted).
pub fn softmax(values: &mut [f64]) {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// Geometry of the tensor the network expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub width:    u32,
    pub height:   u32,
    pub channels: u32,
}

impl InputShape {
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// A fully-connected layer. `weights` is `input_size × size`, row-major by input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights:    Vec<Vec<f64>>,
    pub biases:     Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    pub fn input_size(&self) -> usize { self.weights.len() }

    pub fn size(&self) -> usize { self.biases.len() }

    /// `a = f(x·W + b)`
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.biases.clone();
        for (x, row) in input.iter().zip(&self.weights) {
            if *x == 0.0 {
                continue;
            }
            for (acc, w) in z.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        for v in z.iter_mut() {
            *v = self.activation.apply(*v);
        }
        if self.activation == Activation::Softmax {
            softmax(&mut z);
        }
        z
    }
}

/// Inference-only feed-forward network loaded from a JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input:  InputShape,
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Reads and structurally checks a model artifact.
    pub fn load_json(path: &Path) -> Result<DenseNetwork, ModelLoadError> {
        let file = std::fs::File::open(path)
            .map_err(|source| ModelLoadError::Io { path: path.to_path_buf(), source })?;
        let reader = std::io::BufReader::new(file);
        let network: DenseNetwork = serde_json::from_reader(reader)
            .map_err(|source| ModelLoadError::Json { path: path.to_path_buf(), source })?;
        network.check()?;
        Ok(network)
    }

    /// Serialises the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Every layer's weight matrix must be rectangular and chain onto the
    /// previous layer's output.
    pub fn check(&self) -> Result<(), ModelLoadError> {
        if self.layers.is_empty() {
            return Err(ModelLoadError::Shape("network has no layers".into()));
        }
        let mut expected_in = self.input.len();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.size() == 0 {
                return Err(ModelLoadError::Shape(format!("layer {i} has no neurons")));
            }
            if layer.input_size() != expected_in {
                return Err(ModelLoadError::Shape(format!(
                    "layer {i} takes {} inputs but receives {expected_in}",
                    layer.input_size()
                )));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != layer.size()) {
                return Err(ModelLoadError::Shape(format!(
                    "layer {i} weight row {row} has {} columns, expected {}",
                    layer.weights[row].len(),
                    layer.size()
                )));
            }
            expected_in = layer.size();
        }
        Ok(())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map(DenseLayer::size).unwrap_or(0)
    }

    pub fn output_activation(&self) -> Option<&Activation> {
        self.layers.last().map(|l| &l.activation)
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        current
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A one-layer softmax network over a `side × side × 3` input whose
    /// `winner` output is driven by the mean intensity.
    pub(crate) fn tiny_network(side: u32, classes: usize, winner: usize) -> DenseNetwork {
        let n = (side * side * 3) as usize;
        let weights = (0..n)
            .map(|_| (0..classes).map(|c| if c == winner { 4.0 / n as f64 } else { 0.0 }).collect())
            .collect();
        DenseNetwork {
            name: "tiny".into(),
            description: None,
            input: InputShape { width: side, height: side, channels: 3 },
            layers: vec![DenseLayer {
                weights,
                biases: vec![0.0; classes],
                activation: Activation::Softmax,
            }],
        }
    }

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let mut v = vec![1.0, 3.0, 2.0, 1000.0];
        softmax(&mut v);
        assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(v[3] > v[1] && v[1] > v[2] && v[2] > v[0]);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn elementwise_activations() {
        assert_eq!(Activation::ReLU.apply(-2.0), 0.0);
        assert_eq!(Activation::LeakyReLU { alpha: 0.1 }.apply(-2.0), -0.2);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-12);
        assert_eq!(Activation::Identity.apply(3.5), 3.5);
    }

    #[test]
    fn dense_layer_computes_affine_then_activation() {
        let layer = DenseLayer {
            weights: vec![vec![1.0, -1.0], vec![2.0, 0.5]],
            biases: vec![0.5, 0.0],
            activation: Activation::ReLU,
        };
        // [1, 2]·W + b = [1 + 4 + 0.5, -1 + 1 + 0]
        assert_eq!(layer.forward(&[1.0, 2.0]), vec![5.5, 0.0]);
    }

    #[test]
    fn forward_favours_driven_class() {
        let net = tiny_network(2, 4, 1);
        let out = net.forward(&vec![0.9; 12]);
        assert_eq!(out.len(), 4);
        let best = out.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).unwrap().0;
        assert_eq!(best, 1);
    }

    #[test]
    fn check_rejects_broken_chaining() {
        let mut net = tiny_network(2, 4, 0);
        net.layers.push(DenseLayer {
            weights: vec![vec![1.0; 4]; 3],
            biases: vec![0.0; 4],
            activation: Activation::Softmax,
        });
        assert!(matches!(net.check(), Err(ModelLoadError::Shape(_))));
    }

    #[test]
    fn check_rejects_ragged_weights() {
        let mut net = tiny_network(2, 4, 0);
        net.layers[0].weights[5].pop();
        let err = net.check().unwrap_err().to_string();
        assert!(err.contains("row 5"), "{err}");
    }

    #[test]
    fn json_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        tiny_network(2, 4, 3).save_json(&path).unwrap();

        let loaded = DenseNetwork::load_json(&path).unwrap();
        assert_eq!(loaded.input.len(), 12);
        assert_eq!(loaded.output_size(), 4);
        assert_eq!(loaded.output_activation(), Some(&Activation::Softmax));
    }

    #[test]
    fn malformed_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = DenseNetwork::load_json(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
