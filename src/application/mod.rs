//! Application layer: risk engines and the selector that fronts them.
//!
//! - `model_engine`: trained binary and survival models behind an inference runtime
//! - `mock_engine`: heuristic fallback that needs no artifacts
//! - `hybrid`: picks between them and downgrades on failure
//! - `worker`: runs a calculation on a background thread

pub mod hybrid;
pub mod mock_engine;
pub mod model_engine;
pub mod worker;

pub use hybrid::{
    DefaultRiskCalculator, EngineMode, EngineState, HybridRiskCalculator, ModeEvent, ModeInfo,
};
pub use mock_engine::MockRiskEngine;
pub use model_engine::{FeatureInfo, ModelRiskEngine};
pub use worker::{RiskProgress, RiskWorker, RiskWorkerHandle};
