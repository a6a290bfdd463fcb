//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::CaviRiskError;

/// Directory holding the model artifacts.
pub const MODEL_DIR_ENV: &str = "CAVIRISK_MODEL_DIR";

/// Refuse to load models that are not bound by `manifest.json`.
pub const REQUIRE_MANIFEST_ENV: &str = "CAVIRISK_REQUIRE_MODEL_MANIFEST";

pub const MOCK_INIT_DELAY_ENV: &str = "CAVIRISK_MOCK_INIT_DELAY_MS";
pub const MOCK_LATENCY_ENV: &str = "CAVIRISK_MOCK_LATENCY_MS";
pub const MOCK_SEED_ENV: &str = "CAVIRISK_MOCK_SEED";

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_MOCK_INIT_DELAY_MS: u64 = 1000;
const DEFAULT_MOCK_LATENCY_MS: u64 = 500;

/// Settings for the heuristic engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConfig {
    /// One-time delay simulating engine start-up
    pub init_delay: Duration,

    /// Per-calculation delay simulating model latency
    pub latency: Duration,

    /// Fixed seed for the noise generator; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            init_delay: Duration::from_millis(DEFAULT_MOCK_INIT_DELAY_MS),
            latency: Duration::from_millis(DEFAULT_MOCK_LATENCY_MS),
            seed: None,
        }
    }
}

impl MockConfig {
    /// No simulated delays.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            init_delay: Duration::ZERO,
            latency: Duration::ZERO,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskConfig {
    pub model_dir: PathBuf,
    pub require_manifest: bool,
    pub mock: MockConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            require_manifest: false,
            mock: MockConfig::default(),
        }
    }
}

impl RiskConfig {
    /// Load configuration from `CAVIRISK_*` environment variables.
    ///
    /// # Errors
    /// Returns `CaviRiskError::Config` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, CaviRiskError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, CaviRiskError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model_dir = lookup(MODEL_DIR_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map_or(defaults.model_dir, PathBuf::from);

        let require_manifest = lookup(REQUIRE_MANIFEST_ENV)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let init_delay = match lookup(MOCK_INIT_DELAY_ENV) {
            Some(v) => Duration::from_millis(parse_u64(MOCK_INIT_DELAY_ENV, &v)?),
            None => defaults.mock.init_delay,
        };
        let latency = match lookup(MOCK_LATENCY_ENV) {
            Some(v) => Duration::from_millis(parse_u64(MOCK_LATENCY_ENV, &v)?),
            None => defaults.mock.latency,
        };
        let seed = lookup(MOCK_SEED_ENV)
            .map(|v| parse_u64(MOCK_SEED_ENV, &v))
            .transpose()?;

        Ok(Self {
            model_dir,
            require_manifest,
            mock: MockConfig {
                init_delay,
                latency,
                seed,
            },
        })
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

fn parse_u64(name: &str, v: &str) -> Result<u64, CaviRiskError> {
    v.trim()
        .parse::<u64>()
        .map_err(|_| CaviRiskError::Config(format!("{name} must be a non-negative integer, got {v:?}")))
}
