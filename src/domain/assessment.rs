//! Qualitative risk bands and care recommendations.
//!
//! Maps the two numeric scores onto the bands clinicians read from the
//! report. A score that is not a number lands in the highest band.

use serde::Serialize;

/// Band of the 10-year mortality probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MortalityBand {
    /// Below 20%
    Low,
    /// 20% to 40%
    Moderate,
    /// 40% to 60%
    High,
    /// Above 60%
    VeryHigh,
}

impl MortalityBand {
    #[must_use]
    pub fn from_probability(p: f64) -> Self {
        if p < 0.2 {
            Self::Low
        } else if p < 0.4 {
            Self::Moderate
        } else if p < 0.6 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk (<20%)",
            Self::Moderate => "Moderate Risk (20-40%)",
            Self::High => "High Risk (40-60%)",
            Self::VeryHigh => "Very High Risk (>60%)",
        }
    }

    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Low => "Low risk (<20%) - routine follow-up recommended",
            Self::Moderate => "Moderate risk (20-40%) - enhanced monitoring suggested",
            Self::High => "High risk (40-60%) - intensive intervention recommended",
            Self::VeryHigh => "Very high risk (>60%) - immediate intensive care required",
        }
    }
}

/// Band of the relative long-term risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileBand {
    BelowAverage,
    Average,
    AboveAverage,
    High,
}

impl ProfileBand {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Self::BelowAverage
        } else if score < 60.0 {
            Self::Average
        } else if score < 80.0 {
            Self::AboveAverage
        } else {
            Self::High
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BelowAverage => "Below Average Risk",
            Self::Average => "Average Risk",
            Self::AboveAverage => "Above Average Risk",
            Self::High => "High Risk",
        }
    }

    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::BelowAverage => "Below average risk - routine follow-up recommended",
            Self::Average => "Average risk - standard monitoring appropriate",
            Self::AboveAverage => "Above average risk - enhanced monitoring suggested",
            Self::High => "High risk - intensive intervention recommended",
        }
    }
}

/// Care protocol combining both scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CareProtocol {
    Standard,
    Enhanced,
    Intensive,
    Immediate,
}

impl CareProtocol {
    #[must_use]
    pub fn from_scores(binary_risk: f64, survival_risk: f64) -> Self {
        if binary_risk < 0.3 && survival_risk < 50.0 {
            Self::Standard
        } else if binary_risk < 0.5 && survival_risk < 70.0 {
            Self::Enhanced
        } else if binary_risk < 0.7 && survival_risk < 85.0 {
            Self::Intensive
        } else {
            Self::Immediate
        }
    }

    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Standard => "Low overall risk - standard care protocol",
            Self::Enhanced => "Moderate overall risk - enhanced monitoring protocol",
            Self::Intensive => "High overall risk - intensive intervention protocol",
            Self::Immediate => "Very high overall risk - immediate intensive care protocol",
        }
    }
}

impl std::fmt::Display for MortalityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::fmt::Display for ProfileBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Bands and recommendations for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub mortality: MortalityBand,
    pub profile: ProfileBand,
    pub protocol: CareProtocol,
}

impl RiskAssessment {
    #[must_use]
    pub fn from_scores(binary_risk: f64, survival_risk: f64) -> Self {
        Self {
            mortality: MortalityBand::from_probability(binary_risk),
            profile: ProfileBand::from_score(survival_risk),
            protocol: CareProtocol::from_scores(binary_risk, survival_risk),
        }
    }
}
