//! Hybrid risk calculator: trained models first, heuristic fallback after.
//!
//! The calculator is the single entry point for callers. It tries the primary
//! (trained-model) engine and, the first time that engine fails to load or to
//! run, switches to the fallback engine for the rest of its lifetime.
//!
//! # Mode transitions
//!
//! ```text
//! Pending --InitializationSucceeded--> Production
//! Pending --InitializationFailed-----> Demo
//! Production --InferenceFailed-------> Demo
//! ```
//!
//! `Demo` is absorbing: no event leads back to `Production`.
//!
//! # Concurrency
//!
//! The first initialization runs while holding the state lock, so concurrent
//! first callers wait for it and then observe the settled mode instead of
//! starting their own attempt. Inference itself runs outside the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::adapters::{DenseRuntime, FsArtifactSource};
use crate::config::RiskConfig;
use crate::domain::{ModelPerformance, PatientInput, RiskResult};
use crate::ports::RiskEngine;
use crate::CaviRiskError;

use super::{MockRiskEngine, ModelRiskEngine};

/// Which kind of engine is serving results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineMode {
    /// Trained models
    Production,
    /// Heuristic fallback
    Demo,
}

impl std::fmt::Display for EngineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "Production"),
            Self::Demo => write!(f, "Demo"),
        }
    }
}

/// Events that drive the mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    InitializationSucceeded,
    InitializationFailed,
    InferenceFailed,
}

/// Selector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Initialization not attempted yet
    #[default]
    Pending,
    /// Primary engine loaded and healthy
    Production,
    /// Fallback engine in use for good
    Demo,
}

impl EngineState {
    /// Next state after `event`. Events that do not apply leave the state as is.
    #[must_use]
    pub fn apply(self, event: ModeEvent) -> Self {
        match (self, event) {
            (Self::Pending, ModeEvent::InitializationSucceeded) => Self::Production,
            (Self::Pending, ModeEvent::InitializationFailed) => Self::Demo,
            (Self::Production, ModeEvent::InferenceFailed) => Self::Demo,
            (state, _) => state,
        }
    }

    #[must_use]
    pub fn use_real_models(self) -> bool {
        self == Self::Production
    }

    #[must_use]
    pub fn initialization_attempted(self) -> bool {
        self != Self::Pending
    }

    #[must_use]
    pub fn mode(self) -> EngineMode {
        if self.use_real_models() {
            EngineMode::Production
        } else {
            EngineMode::Demo
        }
    }
}

/// Summary of the active mode for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeInfo {
    pub mode: EngineMode,
    pub description: &'static str,
    pub models: Vec<&'static str>,
}

/// Calculator wired to the shipped model runtime and the heuristic fallback.
pub type DefaultRiskCalculator =
    HybridRiskCalculator<ModelRiskEngine<DenseRuntime, FsArtifactSource>, MockRiskEngine>;

/// Risk calculator that hides whether real or heuristic inference is active.
pub struct HybridRiskCalculator<P, D>
where
    P: RiskEngine,
    D: RiskEngine,
{
    primary: Arc<P>,
    fallback: Arc<D>,
    state: Mutex<EngineState>,
}

impl DefaultRiskCalculator {
    /// Build the standard calculator from configuration.
    #[must_use]
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(
            ModelRiskEngine::from_config(config),
            MockRiskEngine::new(config.mock.clone()),
        )
    }
}

impl<P, D> HybridRiskCalculator<P, D>
where
    P: RiskEngine,
    D: RiskEngine,
{
    #[must_use]
    pub fn new(primary: P, fallback: D) -> Self {
        Self::with_engines(Arc::new(primary), Arc::new(fallback))
    }

    /// Build from engines that are also shared elsewhere.
    #[must_use]
    pub fn with_engines(primary: Arc<P>, fallback: Arc<D>) -> Self {
        Self {
            primary,
            fallback,
            state: Mutex::new(EngineState::default()),
        }
    }

    // Every transition is a single assignment of a Copy value, so a poisoned
    // lock still holds a consistent state.
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current selector state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.lock_state()
    }

    fn record(&self, event: ModeEvent) {
        let mut state = self.lock_state();
        let next = state.apply(event);
        if next != *state {
            tracing::info!("Risk engine mode: {} -> {} ({:?})", state.mode(), next.mode(), event);
        }
        *state = next;
    }

    /// Decide between the primary and fallback engine. Runs at most once.
    ///
    /// # Errors
    /// Returns the fallback engine's error if the primary failed and the
    /// fallback could not be initialized either.
    pub fn initialize(&self) -> Result<(), CaviRiskError> {
        let mut state = self.lock_state();
        if state.initialization_attempted() {
            return Ok(());
        }

        tracing::info!("Attempting to initialize trained risk models...");
        match self.primary.initialize() {
            Ok(()) => {
                *state = state.apply(ModeEvent::InitializationSucceeded);
                tracing::info!("Trained risk models initialized successfully");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to initialize risk models, falling back to mock calculator: {e}");
                *state = state.apply(ModeEvent::InitializationFailed);
                self.fallback.initialize()?;
                tracing::info!("Mock calculator initialized as fallback");
                Ok(())
            }
        }
    }

    /// Estimate risk with whichever engine is active.
    ///
    /// A primary-engine failure is absorbed: the calculator switches to the
    /// fallback for this and every later call.
    ///
    /// # Errors
    /// Returns an error only if the fallback engine fails.
    pub fn calculate_risk(&self, input: &PatientInput) -> Result<RiskResult, CaviRiskError> {
        self.initialize()?;

        if self.state().use_real_models() {
            match self.primary.calculate_risk(input) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!("Model inference failed, falling back to mock calculator: {e}");
                    self.record(ModeEvent::InferenceFailed);
                }
            }
        }

        self.fallback.calculate_risk(input)
    }

    #[must_use]
    pub fn is_using_real_models(&self) -> bool {
        self.state().use_real_models()
    }

    #[must_use]
    pub fn mode_info(&self) -> ModeInfo {
        let mode = self.state().mode();
        match mode {
            EngineMode::Production => ModeInfo {
                mode,
                description: "Using actual trained risk models",
                models: self.primary.model_names(),
            },
            EngineMode::Demo => ModeInfo {
                mode,
                description: "Using mock calculator (risk models unavailable)",
                models: self.fallback.model_names(),
            },
        }
    }

    #[must_use]
    pub fn feature_descriptions(&self) -> &'static [(&'static str, &'static str)] {
        if self.is_using_real_models() {
            self.primary.feature_descriptions()
        } else {
            self.fallback.feature_descriptions()
        }
    }

    #[must_use]
    pub fn model_performance(&self) -> ModelPerformance {
        if self.is_using_real_models() {
            self.primary.model_performance()
        } else {
            self.fallback.model_performance()
        }
    }
}
