//! # CaviRisk
//!
//! Cardiovascular mortality risk estimation from CAVI, ABI and blood markers.
//!
//! This crate provides:
//! - Feature derivation and standardization for the CAVI-enhanced models
//! - Inference over a 10-year mortality classifier and a survival model
//! - A heuristic fallback engine so estimates stay available without models
//! - Qualitative risk bands and care recommendations
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (PatientInput, FeatureVector, RiskResult, bands)
//! - `ports`: Trait definitions for engines, inference runtimes, artifact sources
//! - `adapters`: Concrete implementations (dense JSON runtime, filesystem, log sanitizer)
//! - `application`: Risk engines, hybrid selector and background worker
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{HybridRiskCalculator, MockRiskEngine, ModelRiskEngine};
pub use domain::{PatientInput, RiskAssessment, RiskResult, Sex};

/// Result type for CaviRisk operations
pub type Result<T> = std::result::Result<T, CaviRiskError>;

/// Main error type for CaviRisk.
///
/// `ModelLoad` and `CalculationFailed` carry no detail on purpose: the
/// underlying cause is logged where it occurs and only the generic message
/// reaches the user.
#[derive(Debug, thiserror::Error)]
pub enum CaviRiskError {
    #[error("Invalid patient data: {0}")]
    Validation(String),

    #[error("Failed to load AI models. Please refresh the page.")]
    ModelLoad,

    #[error("Failed to calculate risk. Please check your input data.")]
    CalculationFailed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
