//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (inference runtime, artifact
//! storage) and between interchangeable risk engines.

mod artifacts;
mod inference;
mod risk_engine;

pub use artifacts::{ArtifactError, ArtifactSource};
pub use inference::{
    ExecutionProvider, GraphOptimization, InferenceError, InferenceRuntime, InferenceSession,
    SessionOptions, Tensor,
};
pub use risk_engine::RiskEngine;
