//! Domain layer: Core types and pure computations.
//!
//! Nothing here performs I/O or holds shared state: feature derivation and
//! scaling are deterministic functions of the patient measurements.

mod assessment;
mod features;
mod patient;
mod risk;

pub use assessment::{CareProtocol, MortalityBand, ProfileBand, RiskAssessment};
pub use features::{
    FeatureVector, ModelFamily, ScalingParameters, FEATURE_COUNT, FEATURE_DESCRIPTIONS,
    FEATURE_NAMES,
};
pub use patient::{PatientInput, Sex, INPUT_FIELDS};
pub use risk::{
    BinaryMetrics, Confidence, ModelPerformance, ModelVersions, RiskResult, SurvivalMetrics,
};
