//! Dense runtime: Implementation of InferenceRuntime for exported feed-forward models.
//!
//! Models are exported by the training pipeline as JSON (`format = "dense-v1"`):
//! a named input and output, the expected feature count, and a stack of fully
//! connected layers. Weights are stored row-major as `out x in`.
//!
//! # Execution
//!
//! Sessions evaluate on the calling thread. Only the CPU provider is accepted
//! and `intra_op_threads` must be at least 1; larger values are accepted but
//! evaluation stays single-threaded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ports::{
    ExecutionProvider, InferenceError, InferenceRuntime, InferenceSession, SessionOptions, Tensor,
};

/// Identifier written by the exporter.
pub const DENSE_FORMAT: &str = "dense-v1";

/// Activation applied after a layer's affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Identity => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }
}

/// One fully connected layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedDenseModel {
    pub format: String,
    #[serde(default)]
    pub name: Option<String>,
    pub input_name: String,
    pub output_name: String,
    pub n_features: usize,
    pub layers: Vec<DenseLayer>,
}

impl ExportedDenseModel {
    /// Check that every layer chains onto the previous one.
    fn validate(&self) -> Result<(), InferenceError> {
        if self.format != DENSE_FORMAT {
            return Err(InferenceError::InvalidModel(format!(
                "unsupported format {:?}, expected {DENSE_FORMAT:?}",
                self.format
            )));
        }
        if self.n_features == 0 {
            return Err(InferenceError::InvalidModel("n_features must be positive".into()));
        }
        if self.layers.is_empty() {
            return Err(InferenceError::InvalidModel("model has no layers".into()));
        }

        let mut width = self.n_features;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() || layer.weights.len() != layer.bias.len() {
                return Err(InferenceError::InvalidModel(format!(
                    "layer {i}: {} weight rows for {} biases",
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return Err(InferenceError::InvalidModel(format!(
                    "layer {i} row {row}: expected {width} weights, got {}",
                    layer.weights[row].len()
                )));
            }
            width = layer.bias.len();
        }
        Ok(())
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.layers.iter().fold(input.to_vec(), |x, layer| {
            layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, b)| {
                    let z = row.iter().zip(&x).map(|(w, v)| w * v).sum::<f32>() + b;
                    layer.activation.apply(z)
                })
                .collect()
        })
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |l| l.bias.len())
    }
}

/// Runtime for `dense-v1` models.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseRuntime;

impl DenseRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl InferenceRuntime for DenseRuntime {
    fn load_session(
        &self,
        model: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceSession>, InferenceError> {
        if !options.execution_providers.contains(&ExecutionProvider::Cpu) {
            return Err(InferenceError::UnsupportedOption(
                "dense runtime requires the CPU execution provider".into(),
            ));
        }
        if options.intra_op_threads == 0 {
            return Err(InferenceError::UnsupportedOption(
                "intra_op_threads must be at least 1".into(),
            ));
        }

        let model: ExportedDenseModel = serde_json::from_slice(model)
            .map_err(|e| InferenceError::InvalidModel(e.to_string()))?;
        model.validate()?;

        tracing::debug!(
            "Loaded dense model {:?} ({} features, {} layers)",
            model.name.as_deref().unwrap_or("unnamed"),
            model.n_features,
            model.layers.len()
        );

        Ok(Box::new(DenseSession { model }))
    }
}

/// A loaded `dense-v1` model.
#[derive(Debug)]
pub struct DenseSession {
    model: ExportedDenseModel,
}

impl InferenceSession for DenseSession {
    fn input_names(&self) -> Vec<String> {
        vec![self.model.input_name.clone()]
    }

    fn output_names(&self) -> Vec<String> {
        vec![self.model.output_name.clone()]
    }

    fn run(
        &self,
        mut inputs: HashMap<String, Tensor>,
    ) -> Result<HashMap<String, Tensor>, InferenceError> {
        let input = inputs
            .remove(&self.model.input_name)
            .ok_or_else(|| InferenceError::MissingInput(self.model.input_name.clone()))?;

        let expected = vec![1, self.model.n_features];
        if input.shape != expected || input.data.len() != self.model.n_features {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: input.shape,
            });
        }

        // Non-finite values pass through; callers map them onto their scales.
        let out = self.model.forward(&input.data);
        let output = Tensor::new(vec![1, self.model.output_width()], out)?;
        Ok(HashMap::from([(self.model.output_name.clone(), output)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logistic_model() -> ExportedDenseModel {
        ExportedDenseModel {
            format: DENSE_FORMAT.into(),
            name: Some("test".into()),
            input_name: "input".into(),
            output_name: "output".into(),
            n_features: 2,
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, -1.0]],
                bias: vec![0.0],
                activation: Activation::Sigmoid,
            }],
        }
    }

    fn load(model: &ExportedDenseModel) -> Result<Box<dyn InferenceSession>, InferenceError> {
        let bytes = serde_json::to_vec(model).expect("serialize model");
        DenseRuntime::new().load_session(&bytes, &SessionOptions::single_threaded_cpu())
    }

    fn feed(data: Vec<f32>) -> HashMap<String, Tensor> {
        HashMap::from([("input".to_string(), Tensor::row(data))])
    }

    #[test]
    fn test_logistic_forward() {
        let session = load(&logistic_model()).expect("load");
        let out = session.run(feed(vec![0.5, 0.5])).expect("run");
        let y = out["output"].first().expect("value");
        assert!((y - 0.5).abs() < 1e-6);
        assert_eq!(out["output"].shape, vec![1, 1]);
    }

    #[test]
    fn test_hidden_layer_relu() {
        let mut model = logistic_model();
        model.layers = vec![
            DenseLayer {
                weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                bias: vec![0.0, 0.0],
                activation: Activation::Relu,
            },
            DenseLayer {
                weights: vec![vec![1.0, 1.0]],
                bias: vec![0.5],
                activation: Activation::Identity,
            },
        ];
        let session = load(&model).expect("load");
        let out = session.run(feed(vec![-3.0, 2.0])).expect("run");
        assert!((out["output"].first().unwrap() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_values_pass_through() {
        let session = load(&logistic_model()).expect("load");
        let out = session.run(feed(vec![f32::INFINITY, 0.0])).expect("run");
        assert_eq!(out["output"].first(), Some(1.0));

        let mut model = logistic_model();
        model.layers[0].activation = Activation::Identity;
        let session = load(&model).expect("load");
        let out = session.run(feed(vec![0.0, f32::INFINITY])).expect("run");
        assert_eq!(out["output"].first(), Some(f32::NEG_INFINITY));
        let out = session.run(feed(vec![f32::NAN, 0.0])).expect("run");
        assert!(out["output"].first().unwrap().is_nan());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let session = load(&logistic_model()).expect("load");
        let err = session.run(feed(vec![1.0, 2.0, 3.0])).expect_err("must fail");
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_missing_input_name() {
        let session = load(&logistic_model()).expect("load");
        let inputs = HashMap::from([("features".to_string(), Tensor::row(vec![0.0, 0.0]))]);
        assert!(matches!(
            session.run(inputs),
            Err(InferenceError::MissingInput(name)) if name == "input"
        ));
    }

    #[test]
    fn test_rejects_inconsistent_layers() {
        let mut model = logistic_model();
        model.layers[0].weights = vec![vec![1.0, 2.0, 3.0]];
        assert!(matches!(load(&model), Err(InferenceError::InvalidModel(_))));
    }

    #[test]
    fn test_rejects_unknown_format_and_garbage() {
        let mut model = logistic_model();
        model.format = "onnx".into();
        assert!(load(&model).is_err());

        let garbage = DenseRuntime::new()
            .load_session(b"\x08\x07ONNX", &SessionOptions::single_threaded_cpu());
        assert!(matches!(garbage, Err(InferenceError::InvalidModel(_))));
    }

    #[test]
    fn test_rejects_zero_threads() {
        let bytes = serde_json::to_vec(&logistic_model()).unwrap();
        let mut options = SessionOptions::single_threaded_cpu();
        options.intra_op_threads = 0;
        assert!(matches!(
            DenseRuntime::new().load_session(&bytes, &options),
            Err(InferenceError::UnsupportedOption(_))
        ));
    }
}
