//! Risk engine port: Trait for anything that turns patient input into scores.
//!
//! Both the trained-model engine and the heuristic engine implement it, which
//! lets the hybrid calculator swap one for the other at runtime.

use crate::domain::{ModelPerformance, PatientInput, RiskResult, FEATURE_DESCRIPTIONS};
use crate::CaviRiskError;

/// Trait for risk estimation engines.
///
/// Engines keep their own state behind interior mutability so a single
/// instance can be shared across threads.
pub trait RiskEngine: Send + Sync {
    /// Prepare the engine for use. Must be idempotent: once it has succeeded,
    /// further calls return immediately.
    ///
    /// # Errors
    /// Returns `CaviRiskError::ModelLoad` if the engine cannot be prepared.
    fn initialize(&self) -> Result<(), CaviRiskError>;

    /// Whether `initialize` has completed successfully.
    fn is_initialized(&self) -> bool;

    /// Estimate risk for one patient, initializing first if needed.
    ///
    /// # Errors
    /// Returns `CaviRiskError::CalculationFailed` (or `ModelLoad` from the
    /// implicit initialization) on failure.
    fn calculate_risk(&self, input: &PatientInput) -> Result<RiskResult, CaviRiskError>;

    /// Names of the models or engines backing this implementation.
    fn model_names(&self) -> Vec<&'static str>;

    /// Description of each model feature, in input order.
    fn feature_descriptions(&self) -> &'static [(&'static str, &'static str)] {
        &FEATURE_DESCRIPTIONS
    }

    /// Offline validation metrics of the backing models.
    fn model_performance(&self) -> ModelPerformance {
        ModelPerformance::published()
    }
}
