//! Inference runtime port: Trait for executing pre-trained models.
//!
//! Mirrors the contract of tensor runtimes: a session is created from model
//! bytes and invoked with named float32 tensors.

use std::collections::HashMap;

/// Errors raised by an inference runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Invalid model artifact: {0}")]
    InvalidModel(String),

    #[error("Unsupported session option: {0}")]
    UnsupportedOption(String),

    #[error("Missing input tensor '{0}'")]
    MissingInput(String),

    #[error("Missing output tensor '{0}'")]
    MissingOutput(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// A dense float32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Build a tensor, checking that the payload fills the shape.
    ///
    /// # Errors
    /// Returns `InferenceError::ShapeMismatch` if the element count differs.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// A single-row batch `[1, n]`.
    #[must_use]
    pub fn row(data: Vec<f32>) -> Self {
        Self {
            shape: vec![1, data.len()],
            data,
        }
    }

    /// First element of the payload, if any.
    #[must_use]
    pub fn first(&self) -> Option<f32> {
        self.data.first().copied()
    }
}

/// Compute backend a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
}

/// Graph optimization level requested from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOptimization {
    Disabled,
    Basic,
    All,
}

/// Session configuration handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub execution_providers: Vec<ExecutionProvider>,
    pub intra_op_threads: usize,
    pub graph_optimization: GraphOptimization,
    pub enable_mem_arena: bool,
    pub enable_mem_pattern: bool,
    pub enable_profiling: bool,
}

impl SessionOptions {
    /// Minimal configuration: one CPU thread, basic optimizations, no arena,
    /// memory pattern or profiling.
    #[must_use]
    pub fn single_threaded_cpu() -> Self {
        Self {
            execution_providers: vec![ExecutionProvider::Cpu],
            intra_op_threads: 1,
            graph_optimization: GraphOptimization::Basic,
            enable_mem_arena: false,
            enable_mem_pattern: false,
            enable_profiling: false,
        }
    }
}

/// A loaded model ready to run.
pub trait InferenceSession: Send + Sync {
    /// Names of the tensors the model expects.
    fn input_names(&self) -> Vec<String>;

    /// Names of the tensors the model produces.
    fn output_names(&self) -> Vec<String>;

    /// Run the model on named inputs.
    ///
    /// # Errors
    /// Returns an `InferenceError` on missing inputs, shape mismatches or
    /// execution failure.
    fn run(&self, inputs: HashMap<String, Tensor>) -> Result<HashMap<String, Tensor>, InferenceError>;
}

/// Trait for runtimes that turn model artifacts into sessions.
pub trait InferenceRuntime: Send + Sync {
    /// Create a session from serialized model bytes.
    ///
    /// # Errors
    /// Returns `InferenceError::InvalidModel` if the bytes are not a model the
    /// runtime understands, or `UnsupportedOption` for unusable options.
    fn load_session(
        &self,
        model: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceSession>, InferenceError>;
}
