//! Patient measurement types for CAVI-based mortality risk estimation.
//!
//! Six raw measurements are collected per patient: age, sex, CAVI, ABI,
//! hematocrit and hemoglobin.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CaviRiskError;

/// Form field names, in the order they are presented and reported.
pub const INPUT_FIELDS: [&str; 6] = ["age", "sex", "cavi_mean", "abi_mean", "hct", "hb"];

/// Patient sex as encoded by the models (0 = female, 1 = male).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// Numeric indicator fed to the feature vector.
    #[must_use]
    pub fn indicator(self) -> f64 {
        match self {
            Self::Female => 0.0,
            Self::Male => 1.0,
        }
    }
}

/// Raw measurements for one risk calculation.
///
/// Values are free-form numbers: no clinical range is enforced here. A field
/// that failed to parse is carried as `NaN` and flows into the result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    /// Age in years
    pub age: f64,

    /// Sex indicator: 0 = female, 1 = male
    pub sex: f64,

    /// Cardio-Ankle Vascular Index (mean of left/right)
    pub cavi_mean: f64,

    /// Ankle-Brachial Index (mean of left/right)
    pub abi_mean: f64,

    /// Hematocrit in %
    pub hct: f64,

    /// Hemoglobin in g/dL (collected, not used by the current models)
    pub hb: f64,
}

impl PatientInput {
    /// Create input from typed measurements.
    #[must_use]
    pub fn new(age: f64, sex: Sex, cavi_mean: f64, abi_mean: f64, hct: f64, hb: f64) -> Self {
        Self {
            age,
            sex: sex.indicator(),
            cavi_mean,
            abi_mean,
            hct,
            hb,
        }
    }

    /// Build input from raw form fields keyed by [`INPUT_FIELDS`].
    ///
    /// Every field must be present and non-blank. Numbers are read from the
    /// leading numeric prefix of each value, so `"65kg"` reads as 65 and
    /// `"1.9"` as sex 1. Values with no numeric prefix (including `"inf"`)
    /// become `NaN` rather than an error.
    ///
    /// # Errors
    /// Returns `CaviRiskError::Validation` naming all missing fields.
    pub fn from_form<'a, I>(fields: I) -> Result<Self, CaviRiskError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut values: [Option<&str>; 6] = [None; 6];
        for (name, value) in fields {
            if let Some(idx) = INPUT_FIELDS.iter().position(|f| *f == name) {
                if !value.trim().is_empty() {
                    values[idx] = Some(value);
                }
            }
        }

        let missing: Vec<&str> = INPUT_FIELDS
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(CaviRiskError::Validation(format!(
                "Please fill in all required fields: {}",
                missing.join(", ")
            )));
        }

        let float = |idx: usize| values[idx].map_or(f64::NAN, parse_float);

        Ok(Self {
            age: float(0),
            sex: values[1].map_or(f64::NAN, parse_int),
            cavi_mean: float(2),
            abi_mean: float(3),
            hct: float(4),
            hb: float(5),
        })
    }

    /// True when any measurement is not a finite number.
    #[must_use]
    pub fn has_non_finite(&self) -> bool {
        [self.age, self.sex, self.cavi_mean, self.abi_mean, self.hct, self.hb]
            .iter()
            .any(|v| !v.is_finite())
    }
}

static FLOAT_PREFIX: OnceLock<Regex> = OnceLock::new();
static INT_PREFIX: OnceLock<Regex> = OnceLock::new();

fn float_prefix() -> &'static Regex {
    FLOAT_PREFIX.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("Valid regex")
    })
}

fn int_prefix() -> &'static Regex {
    INT_PREFIX.get_or_init(|| {
        Regex::new(r"^([+-]?)(?:0[xX]([0-9a-fA-F]+)|(\d+))").expect("Valid regex")
    })
}

fn parse_float(raw: &str) -> f64 {
    float_prefix()
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

// Whole-number prefix only ("1.9" -> 1); a 0x prefix reads hexadecimal.
fn parse_int(raw: &str) -> f64 {
    let Some(caps) = int_prefix().captures(raw.trim_start()) else {
        return f64::NAN;
    };
    let magnitude = match (caps.get(2), caps.get(3)) {
        (Some(hex), _) => hex
            .as_str()
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, d| acc * 16.0 + f64::from(d)),
        (None, Some(dec)) => dec.as_str().parse::<f64>().unwrap_or(f64::NAN),
        (None, None) => f64::NAN,
    };
    if &caps[1] == "-" {
        -magnitude
    } else {
        magnitude
    }
}
