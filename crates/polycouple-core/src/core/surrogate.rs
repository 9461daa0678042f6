//! File-backed surrogate model: a dense feed-forward network with standard
//! scalers on its input and output.
//!
//! A model directory holds three TOML files:
//!
//! - `model.toml`: `[[layer]]` tables with `kernel` (shape `[inputs][outputs]`),
//!   `bias` (length `outputs`) and `activation`
//!   (`linear`, `relu`, `tanh`, `sigmoid` or `elu`).
//! - `x_scaler.toml` / `y_scaler.toml`: `mean` and `scale` arrays.

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const MODEL_FILE: &str = "model.toml";
pub const X_SCALER_FILE: &str = "x_scaler.toml";
pub const Y_SCALER_FILE: &str = "y_scaler.toml";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Network has no layers")]
    NoLayers,
    #[error("Invalid shape: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    Elu,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp() - 1.0
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayerEntry {
    kernel: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation: Activation,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkFile {
    layer: Vec<LayerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScalerFile {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ModelError::Toml {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Per-feature standardization `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: DVector<f64>,
    scale: DVector<f64>,
}

impl StandardScaler {
    /// Zero entries of `scale` are treated as 1 (constant features pass through centered).
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() || mean.is_empty() {
            return Err(ModelError::Shape(format!(
                "scaler mean has {} entries, scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();
        Ok(Self {
            mean: DVector::from_vec(mean),
            scale: DVector::from_vec(scale),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file: ScalerFile = read_toml(path)?;
        Self::new(file.mean, file.scale)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &DVector<f64>) -> DVector<f64> {
        (x - &self.mean).component_div(&self.scale)
    }

    pub fn inverse_transform(&self, y: &DVector<f64>) -> DVector<f64> {
        y.component_mul(&self.scale) + &self.mean
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

impl DenseLayer {
    /// `kernel` is indexed `[input][output]`.
    pub fn new(
        kernel: &[Vec<f64>],
        bias: Vec<f64>,
        activation: Activation,
    ) -> Result<Self, ModelError> {
        let inputs = kernel.len();
        let outputs = bias.len();
        if inputs == 0 || outputs == 0 {
            return Err(ModelError::Shape("layer with zero width".to_string()));
        }
        if let Some(row) = kernel.iter().find(|row| row.len() != outputs) {
            return Err(ModelError::Shape(format!(
                "kernel row has {} entries, bias has {}",
                row.len(),
                outputs
            )));
        }
        let weights = DMatrix::from_fn(outputs, inputs, |o, i| kernel[i][o]);
        Ok(Self {
            weights,
            bias: DVector::from_vec(bias),
            activation,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn forward(&self, x: &DVector<f64>) -> DVector<f64> {
        let activation = self.activation;
        (&self.weights * x + &self.bias).map(|v| activation.apply(v))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ModelError> {
        if layers.is_empty() {
            return Err(ModelError::NoLayers);
        }
        for (k, pair) in layers.windows(2).enumerate() {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(ModelError::Shape(format!(
                    "layer {} outputs {} values, layer {} expects {}",
                    k,
                    pair[0].output_dim(),
                    k + 1,
                    pair[1].input_dim()
                )));
            }
        }
        Ok(Self { layers })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file: NetworkFile = read_toml(path)?;
        let layers = file
            .layer
            .into_iter()
            .map(|l| DenseLayer::new(&l.kernel, l.bias, l.activation))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layers)
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_dim()
    }

    pub fn forward(&self, x: &DVector<f64>) -> DVector<f64> {
        self.layers
            .iter()
            .fold(x.clone(), |acc, layer| layer.forward(&acc))
    }
}

/// Input scaler, network and output scaler loaded from one model directory.
#[derive(Debug, Clone)]
pub struct SurrogateModel {
    pub x_scaler: StandardScaler,
    pub network: DenseNetwork,
    pub y_scaler: StandardScaler,
}

impl SurrogateModel {
    pub fn new(
        x_scaler: StandardScaler,
        network: DenseNetwork,
        y_scaler: StandardScaler,
    ) -> Result<Self, ModelError> {
        if x_scaler.dim() != network.input_dim() {
            return Err(ModelError::Shape(format!(
                "input scaler has {} features, network expects {}",
                x_scaler.dim(),
                network.input_dim()
            )));
        }
        if y_scaler.dim() != network.output_dim() {
            return Err(ModelError::Shape(format!(
                "output scaler has {} targets, network produces {}",
                y_scaler.dim(),
                network.output_dim()
            )));
        }
        Ok(Self {
            x_scaler,
            network,
            y_scaler,
        })
    }

    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let x_scaler = StandardScaler::load(&dir.join(X_SCALER_FILE))?;
        let network = DenseNetwork::load(&dir.join(MODEL_FILE))?;
        let y_scaler = StandardScaler::load(&dir.join(Y_SCALER_FILE))?;
        Self::new(x_scaler, network, y_scaler)
    }

    pub fn input_dim(&self) -> usize {
        self.network.input_dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scaler_round_trips_and_treats_zero_scale_as_one() {
        let scaler = StandardScaler::new(vec![1.0, 2.0], vec![2.0, 0.0]).unwrap();
        let x = DVector::from_vec(vec![5.0, 7.0]);
        let z = scaler.transform(&x);
        assert_eq!(z, DVector::from_vec(vec![2.0, 5.0]));
        assert_eq!(scaler.inverse_transform(&z), x);
    }

    #[test]
    fn activations_match_their_definitions() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Linear.apply(-2.0), -2.0);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-12);
        assert!((Activation::Elu.apply(-1.0) - (-1.0f64).exp_m1()).abs() < 1e-12);
        assert!((Activation::Tanh.apply(0.5) - 0.5f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn dense_layer_uses_input_major_kernel() {
        // y0 = 1*x0 + 3*x1, y1 = 2*x0 + 4*x1
        let layer = DenseLayer::new(
            &[vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![0.5, -0.5],
            Activation::Linear,
        )
        .unwrap();
        let y = layer.forward(&DVector::from_vec(vec![1.0, 1.0]));
        assert_eq!(y, DVector::from_vec(vec![4.5, 5.5]));
    }

    #[test]
    fn network_rejects_mismatched_layers() {
        let a = DenseLayer::new(&[vec![1.0, 1.0]], vec![0.0, 0.0], Activation::Relu).unwrap();
        let b = DenseLayer::new(&[vec![1.0]], vec![0.0], Activation::Linear).unwrap();
        assert!(matches!(
            DenseNetwork::new(vec![a, b]),
            Err(ModelError::Shape(_))
        ));
        assert!(matches!(DenseNetwork::new(vec![]), Err(ModelError::NoLayers)));
    }

    #[test]
    fn load_reads_model_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MODEL_FILE),
            r#"
            [[layer]]
            kernel = [[1.0], [1.0]]
            bias = [0.0]
            activation = "linear"
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join(X_SCALER_FILE),
            "mean = [0.0, 0.0]\nscale = [1.0, 1.0]\n",
        )
        .unwrap();
        fs::write(dir.path().join(Y_SCALER_FILE), "mean = [10.0]\nscale = [2.0]\n").unwrap();

        let model = SurrogateModel::load(dir.path()).unwrap();
        assert_eq!(model.input_dim(), 2);
        let z = model.network.forward(&DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(model.y_scaler.inverse_transform(&z)[0], 16.0);
    }

    #[test]
    fn load_rejects_scaler_dimension_mismatch() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MODEL_FILE),
            "[[layer]]\nkernel = [[1.0]]\nbias = [0.0]\nactivation = \"linear\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(X_SCALER_FILE),
            "mean = [0.0, 0.0]\nscale = [1.0, 1.0]\n",
        )
        .unwrap();
        fs::write(dir.path().join(Y_SCALER_FILE), "mean = [0.0]\nscale = [1.0]\n").unwrap();
        assert!(matches!(
            SurrogateModel::load(dir.path()),
            Err(ModelError::Shape(_))
        ));
    }
}
