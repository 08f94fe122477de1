use crate::prelude::{SwathError, SwathResult};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Maps a `[samples, features]` matrix to `[samples, outputs]`.
pub trait Predictor {
    fn predict(&self, features: ArrayView2<f64>) -> SwathResult<Array2<f64>>;
}

impl<F> Predictor for F
where
    F: Fn(ArrayView2<f64>) -> SwathResult<Array2<f64>>,
{
    fn predict(&self, features: ArrayView2<f64>) -> SwathResult<Array2<f64>> {
        self(features)
    }
}

#[derive(Deserialize, Serialize)]
struct LinearModelFile {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// Affine model `features · weights + bias`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearModel {
    /// `weights` is `[features, outputs]`; `bias` has one entry per output.
    pub fn new(weights: Array2<f64>, bias: Array1<f64>) -> SwathResult<Self> {
        if weights.ncols() != bias.len() {
            return Err(SwathError::InvalidConfiguration(format!(
                "linear model has {} outputs but {} biases",
                weights.ncols(),
                bias.len()
            )));
        }
        Ok(Self { weights, bias })
    }

    /// Reads `{"weights": [[...], ...], "bias": [...]}`, one weight row per feature.
    pub fn load<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let path = path.as_ref();
        let unavailable = |err: String| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        };
        let contents = fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
        let file: LinearModelFile =
            serde_json::from_str(&contents).map_err(|err| unavailable(err.to_string()))?;

        let rows = file.weights.len();
        let cols = file.bias.len();
        if file.weights.iter().any(|row| row.len() != cols) {
            return Err(unavailable(format!("every weight row needs {} entries", cols)));
        }
        let flat: Vec<f64> = file.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|err| unavailable(err.to_string()))?;
        Self::new(weights, Array1::from(file.bias))
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: ArrayView2<f64>) -> SwathResult<Array2<f64>> {
        if features.ncols() != self.inputs() {
            return Err(SwathError::ShapeMismatch {
                name: "model features".to_string(),
                expected: vec![features.nrows(), self.inputs()],
                found: features.shape().to_vec(),
            });
        }
        let mut output = features.dot(&self.weights);
        for mut row in output.axis_iter_mut(Axis(0)) {
            row += &self.bias;
        }
        Ok(output)
    }
}
