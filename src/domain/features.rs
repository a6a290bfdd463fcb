//! Feature derivation and standardization.
//!
//! The models consume ten features: the five raw measurements they were
//! trained on plus five CAVI-derived interaction and category terms.

use serde::Serialize;

use super::patient::PatientInput;

/// Number of features fed to each model.
pub const FEATURE_COUNT: usize = 10;

/// Feature names in model input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "sex",
    "cavi_mean",
    "abi_mean",
    "hct",
    "cavi_age_interaction",
    "cavi_sex_interaction",
    "cavi_normal",
    "cavi_elevated",
    "cavi_age_adjusted",
];

/// Human-readable description of each feature, in model input order.
pub const FEATURE_DESCRIPTIONS: [(&str, &str); FEATURE_COUNT] = [
    ("age", "Patient age in years"),
    ("sex", "Patient sex (1=Male, 0=Female)"),
    ("cavi_mean", "Cardio-Ankle Vascular Index mean value"),
    ("abi_mean", "Ankle-Brachial Index mean value"),
    ("hct", "Hematocrit (%)"),
    ("cavi_age_interaction", "CAVI × Age interaction term"),
    ("cavi_sex_interaction", "CAVI × Sex interaction term"),
    ("cavi_normal", "Normal CAVI category (8-10)"),
    ("cavi_elevated", "Elevated CAVI category (>10)"),
    ("cavi_age_adjusted", "Age-adjusted CAVI value"),
];

/// Lower bound of the normal CAVI range (inclusive).
const CAVI_NORMAL_MIN: f64 = 8.0;

/// Upper bound of the normal CAVI range (inclusive); above it CAVI is elevated.
const CAVI_NORMAL_MAX: f64 = 10.0;

/// Reference age for the age-adjusted CAVI term.
const CAVI_REFERENCE_AGE: f64 = 65.0;

/// Model family a feature vector is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// 10-year mortality classifier
    Binary,
    /// Survival / hazard regressor
    Survival,
}

/// Per-feature standardization constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingParameters {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

const POPULATION_SCALING: ScalingParameters = ScalingParameters {
    mean: [67.2, 0.53, 9.47, 1.1, 42.5, 636.8, 5.0, 0.3, 0.7, 9.2],
    std: [12.8, 0.5, 2.57, 0.2, 5.0, 200.0, 2.5, 0.5, 0.5, 2.0],
};

impl ScalingParameters {
    /// Fixed scaling table for a model family.
    ///
    /// Both families currently share the cohort statistics.
    #[must_use]
    pub fn for_family(family: ModelFamily) -> &'static Self {
        match family {
            ModelFamily::Binary | ModelFamily::Survival => &POPULATION_SCALING,
        }
    }

    /// Standardize one value. A zero or non-finite std falls back to
    /// passthrough for that feature (mean 0, std 1).
    #[must_use]
    pub fn standardize(&self, index: usize, value: f64) -> f64 {
        let (Some(&mean), Some(&std)) = (self.mean.get(index), self.std.get(index)) else {
            return value;
        };
        if std == 0.0 || !std.is_finite() || !mean.is_finite() {
            return value;
        }
        (value - mean) / std
    }
}

/// The ten-feature model input, in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Derive the full feature vector from raw measurements.
    ///
    /// Hemoglobin is not part of the trained feature set.
    #[must_use]
    pub fn derive(input: &PatientInput) -> Self {
        let PatientInput {
            age,
            sex,
            cavi_mean,
            abi_mean,
            hct,
            ..
        } = *input;

        let cavi_normal = (CAVI_NORMAL_MIN..=CAVI_NORMAL_MAX).contains(&cavi_mean);
        let cavi_elevated = cavi_mean > CAVI_NORMAL_MAX;

        Self([
            age,
            sex,
            cavi_mean,
            abi_mean,
            hct,
            cavi_mean * age,
            cavi_mean * sex,
            flag(cavi_normal),
            flag(cavi_elevated),
            cavi_mean / (age / CAVI_REFERENCE_AGE),
        ])
    }

    /// Element-wise standardization with the family's scaling table.
    #[must_use]
    pub fn scaled(&self, family: ModelFamily) -> Self {
        let params = ScalingParameters::for_family(family);
        let mut out = self.0;
        for (i, v) in out.iter_mut().enumerate() {
            *v = params.standardize(i, *v);
        }
        Self(out)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    /// Narrow to the float32 payload the runtime expects.
    #[must_use]
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sex;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_interaction_terms() {
        let input = PatientInput::new(65.0, Sex::Male, 9.5, 1.1, 42.5, 14.2);
        let v = FeatureVector::derive(&input);

        assert_eq!(v.as_slice().len(), FEATURE_COUNT);
        assert!(approx(v.as_slice()[5], 9.5 * 65.0));
        assert!(approx(v.as_slice()[6], 9.5));
        assert!(approx(v.as_slice()[9], 9.5));
    }

    #[test]
    fn test_normal_cavi_at_lower_bound() {
        let input = PatientInput::new(50.0, Sex::Female, 8.0, 1.3, 45.0, 13.0);
        let v = FeatureVector::derive(&input);

        assert_eq!(v.get("cavi_normal"), Some(1.0));
        assert_eq!(v.get("cavi_elevated"), Some(0.0));
        assert_eq!(v.get("cavi_sex_interaction"), Some(0.0));
        assert!(approx(v.as_slice()[9], 8.0 / (50.0 / 65.0)));
        assert!(approx(v.as_slice()[9], 10.4));
    }

    #[test]
    fn test_category_flags_are_exclusive() {
        for cavi in [5.0, 7.99, 8.0, 9.0, 10.0, 10.01, 14.0] {
            let v = FeatureVector::derive(&PatientInput::new(60.0, Sex::Male, cavi, 1.0, 40.0, 13.0));
            let normal = v.get("cavi_normal").unwrap();
            let elevated = v.get("cavi_elevated").unwrap();
            assert!(normal + elevated <= 1.0, "cavi={cavi}");
            assert_eq!(normal == 1.0, (8.0..=10.0).contains(&cavi), "cavi={cavi}");
            assert_eq!(elevated == 1.0, cavi > 10.0, "cavi={cavi}");
        }
    }

    #[test]
    fn test_nan_input_propagates() {
        let mut input = PatientInput::new(65.0, Sex::Male, 9.5, 1.1, 42.5, 14.2);
        input.age = f64::NAN;
        let v = FeatureVector::derive(&input);
        assert!(v.as_slice()[5].is_nan());
        assert!(v.as_slice()[9].is_nan());
        assert!(v.scaled(ModelFamily::Binary).as_slice()[0].is_nan());
    }

    #[test]
    fn test_scaling_is_pure() {
        let v = FeatureVector::derive(&PatientInput::new(65.0, Sex::Male, 9.5, 1.1, 42.5, 14.2));
        let first = v.scaled(ModelFamily::Survival);
        let second = v.scaled(ModelFamily::Survival);
        assert_eq!(first, second);
        assert_eq!(v.scaled(ModelFamily::Binary), first);
        assert!(approx(first.as_slice()[0], (65.0 - 67.2) / 12.8));
    }

    #[test]
    fn test_standardize_passthrough_for_missing_index() {
        let params = ScalingParameters::for_family(ModelFamily::Binary);
        assert_eq!(params.standardize(FEATURE_COUNT + 3, 4.2), 4.2);
    }
}
