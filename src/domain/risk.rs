//! Risk calculation result types.

use serde::{Deserialize, Serialize};

use super::assessment::RiskAssessment;

/// Version labels of the models that produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersions {
    pub binary: String,
    pub survival: String,
}

/// Static confidence attached to heuristic estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub binary: f64,
    pub survival: f64,
}

/// Output of one risk calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    /// Probability of death within 10 years (0.0 to 1.0)
    pub binary_risk: f64,

    /// Relative long-term risk score (0 to 100, 50 = population average)
    pub survival_risk: f64,

    /// When the calculation ran (serialized as RFC 3339)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub model_versions: ModelVersions,

    /// Present only for heuristic (demo) results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl RiskResult {
    /// Create a result stamped with the current time.
    #[must_use]
    pub fn new(binary_risk: f64, survival_risk: f64, model_versions: ModelVersions) -> Self {
        Self {
            binary_risk,
            survival_risk,
            timestamp: chrono::Utc::now(),
            model_versions,
            confidence: None,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Qualitative bands and recommendations for this result.
    #[must_use]
    pub fn assessment(&self) -> RiskAssessment {
        RiskAssessment::from_scores(self.binary_risk, self.survival_risk)
    }
}

/// Published validation metrics of the binary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinaryMetrics {
    pub auc: f64,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// Published validation metrics of the survival model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurvivalMetrics {
    pub c_index: f64,
    pub description: &'static str,
}

/// Model performance summary shown alongside results.
///
/// These figures come from offline validation and are not computed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPerformance {
    pub binary: BinaryMetrics,
    pub survival: SurvivalMetrics,
}

impl ModelPerformance {
    /// Metrics reported for the v1.0 CAVI models.
    #[must_use]
    pub const fn published() -> Self {
        Self {
            binary: BinaryMetrics {
                auc: 0.907,
                accuracy: 0.75,
                sensitivity: 1.0,
                specificity: 0.0,
            },
            survival: SurvivalMetrics {
                c_index: 0.6892,
                description: "Moderate discriminative ability",
            },
        }
    }
}
