//! Heuristic risk engine used when the trained models are unavailable.
//!
//! Scores come from a closed-form weighting of the raw measurements with a
//! small amount of noise, so repeated calls on the same patient vary slightly
//! the way model estimates would. Always available; never touches artifacts.

use std::sync::{Mutex, Once};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::MockConfig;
use crate::domain::{Confidence, ModelVersions, PatientInput, RiskResult};
use crate::ports::RiskEngine;
use crate::CaviRiskError;

pub const MOCK_BINARY_VERSION: &str = "CAVI-Enhanced 10-Year Mortality Predictor v1.0 (Mock)";
pub const MOCK_SURVIVAL_VERSION: &str = "DeepSurv Long-term Risk Profiler v1.0 (Mock)";
pub const MOCK_ENGINE_NAME: &str = "Mock Risk Calculator (Clinical Knowledge-based)";

/// Fixed confidence reported with heuristic results.
pub const MOCK_CONFIDENCE: Confidence = Confidence {
    binary: 0.85,
    survival: 0.65,
};

const BINARY_RISK_CAP: f64 = 0.95;
const BINARY_RISK_FLOOR: f64 = 0.05;
const BINARY_NOISE: f64 = 0.05;
const SURVIVAL_NOISE: f64 = 0.1;

/// Weighted contributions of each measurement to the heuristic score.
///
/// Every factor is non-negative; hemoglobin does not contribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFactors {
    pub age: f64,
    pub cavi: f64,
    pub abi: f64,
    pub sex: f64,
    pub hct: f64,
}

impl RiskFactors {
    #[must_use]
    pub fn from_input(input: &PatientInput) -> Self {
        Self {
            // Rises linearly from 50 and saturates at 80.
            age: ((input.age - 50.0) / 30.0).clamp(0.0, 1.0) * 0.3,
            // Stiffer arteries above the normal floor.
            cavi: non_negative((input.cavi_mean - 8.0) / 5.0) * 0.4,
            // Low ABI indicates peripheral arterial disease.
            abi: non_negative((1.1 - input.abi_mean) / 0.5) * 0.2,
            sex: if input.sex == 1.0 { 0.1 } else { 0.0 },
            // Anemia.
            hct: non_negative((40.0 - input.hct) / 10.0) * 0.1,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.age + self.cavi + self.abi + self.sex + self.hct
    }

    /// Binary risk before noise: the total, capped.
    #[must_use]
    pub fn binary_base(&self) -> f64 {
        self.total().clamp(0.0, BINARY_RISK_CAP)
    }

    /// Survival score before noise: total mapped onto 0..100 around 50.
    #[must_use]
    pub fn survival_base(&self) -> f64 {
        (self.total() * 200.0 + 50.0).clamp(0.0, 100.0)
    }
}

// NaN passes through untouched, unlike f64::max.
fn non_negative(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else {
        x
    }
}

/// Heuristic engine.
pub struct MockRiskEngine {
    config: MockConfig,
    init: Once,
    rng: Mutex<ChaCha20Rng>,
}

impl MockRiskEngine {
    /// Create an engine; noise is seeded from `config.seed` or OS entropy.
    #[must_use]
    pub fn new(config: MockConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        Self {
            config,
            init: Once::new(),
            rng: Mutex::new(rng),
        }
    }

    fn noise(&self) -> Result<(f64, f64), CaviRiskError> {
        let mut rng = self.rng.lock().map_err(|_| {
            tracing::error!("Mock engine RNG lock poisoned");
            CaviRiskError::CalculationFailed
        })?;
        Ok((
            rng.gen_range(-BINARY_NOISE..=BINARY_NOISE),
            rng.gen_range(-SURVIVAL_NOISE..=SURVIVAL_NOISE),
        ))
    }
}

impl Default for MockRiskEngine {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl RiskEngine for MockRiskEngine {
    fn initialize(&self) -> Result<(), CaviRiskError> {
        self.init.call_once(|| {
            tracing::info!("Initializing mock risk calculator...");
            if !self.config.init_delay.is_zero() {
                std::thread::sleep(self.config.init_delay);
            }
            tracing::info!("Mock risk calculator initialized");
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.init.is_completed()
    }

    fn calculate_risk(&self, input: &PatientInput) -> Result<RiskResult, CaviRiskError> {
        self.initialize()?;

        if !self.config.latency.is_zero() {
            std::thread::sleep(self.config.latency);
        }

        let factors = RiskFactors::from_input(input);
        let (binary_noise, survival_noise) = self.noise()?;

        let binary_risk =
            (factors.binary_base() + binary_noise).clamp(BINARY_RISK_FLOOR, BINARY_RISK_CAP);
        let survival_risk = (factors.survival_base() + survival_noise).clamp(0.0, 100.0);

        tracing::debug!(
            "Mock estimate: base={:.3}, binary={:.3}, survival={:.1}",
            factors.total(),
            binary_risk,
            survival_risk
        );

        Ok(RiskResult::new(
            binary_risk,
            survival_risk,
            ModelVersions {
                binary: MOCK_BINARY_VERSION.to_string(),
                survival: MOCK_SURVIVAL_VERSION.to_string(),
            },
        )
        .with_confidence(MOCK_CONFIDENCE))
    }

    fn model_names(&self) -> Vec<&'static str> {
        vec![MOCK_ENGINE_NAME]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sex;

    fn engine(seed: u64) -> MockRiskEngine {
        MockRiskEngine::new(MockConfig::instant().with_seed(seed))
    }

    fn reference_patient() -> PatientInput {
        PatientInput::new(65.0, Sex::Male, 9.5, 1.1, 42.5, 14.2)
    }

    #[test]
    fn test_factors_for_reference_patient() {
        let f = RiskFactors::from_input(&reference_patient());
        assert!((f.age - 0.15).abs() < 1e-9);
        assert!((f.cavi - 0.12).abs() < 1e-9);
        assert!(f.abi.abs() < 1e-9);
        assert!((f.sex - 0.1).abs() < 1e-9);
        assert_eq!(f.hct, 0.0);
        assert_eq!(f.survival_base(), 100.0);
    }

    #[test]
    fn test_factors_are_non_negative() {
        let young_healthy = PatientInput::new(30.0, Sex::Female, 6.0, 1.4, 48.0, 15.0);
        let f = RiskFactors::from_input(&young_healthy);
        assert_eq!(f.total(), 0.0);
        assert_eq!(f.survival_base(), 50.0);
    }

    #[test]
    fn test_bounds_hold_across_repeated_calls() {
        let engine = engine(7);
        let patients = [
            reference_patient(),
            PatientInput::new(30.0, Sex::Female, 6.0, 1.4, 48.0, 15.0),
            PatientInput::new(90.0, Sex::Male, 15.0, 0.4, 25.0, 9.0),
        ];
        for patient in &patients {
            for _ in 0..200 {
                let r = engine.calculate_risk(patient).expect("mock never fails");
                assert!((0.05..=0.95).contains(&r.binary_risk), "{}", r.binary_risk);
                assert!((0.0..=100.0).contains(&r.survival_risk), "{}", r.survival_risk);
            }
        }
    }

    #[test]
    fn test_noise_stays_within_band() {
        let engine = engine(11);
        let patient = PatientInput::new(60.0, Sex::Female, 9.0, 1.0, 41.0, 13.5);
        let base = RiskFactors::from_input(&patient);
        for _ in 0..100 {
            let r = engine.calculate_risk(&patient).unwrap();
            assert!((r.binary_risk - base.binary_base()).abs() <= 0.05 + 1e-12);
            assert!((r.survival_risk - base.survival_base()).abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = engine(3).calculate_risk(&reference_patient()).unwrap();
        let b = engine(3).calculate_risk(&reference_patient()).unwrap();
        assert_eq!(a.binary_risk, b.binary_risk);
        assert_eq!(a.survival_risk, b.survival_risk);
    }

    #[test]
    fn test_result_metadata() {
        let engine = engine(1);
        assert!(!engine.is_initialized());
        let r = engine.calculate_risk(&reference_patient()).unwrap();
        assert!(engine.is_initialized());
        assert!(r.model_versions.binary.contains("(Mock)"));
        assert!(r.model_versions.survival.contains("(Mock)"));
        assert_eq!(r.confidence, Some(MOCK_CONFIDENCE));
    }

    #[test]
    fn test_nan_input_propagates() {
        let mut patient = reference_patient();
        patient.cavi_mean = f64::NAN;
        let r = engine(5).calculate_risk(&patient).unwrap();
        assert!(r.binary_risk.is_nan());
        assert!(r.survival_risk.is_nan());
    }
}
