//! Trained-model risk engine.
//!
//! Coordinates:
//! - Artifact loading (two models plus feature metadata, optional manifest)
//! - Feature derivation and per-family scaling
//! - Binary and survival inference
//! - Mapping raw outputs onto the reported scales

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::adapters::fs_source::{ModelManifest, MANIFEST_FILE};
use crate::adapters::{DenseRuntime, FsArtifactSource};
use crate::config::RiskConfig;
use crate::domain::{
    FeatureVector, ModelFamily, ModelVersions, PatientInput, RiskResult, FEATURE_NAMES,
};
use crate::ports::{
    ArtifactError, ArtifactSource, InferenceError, InferenceRuntime, InferenceSession,
    RiskEngine, SessionOptions, Tensor,
};
use crate::CaviRiskError;

pub const BINARY_MODEL_ARTIFACT: &str = "cavi_binary_model.json";
pub const SURVIVAL_MODEL_ARTIFACT: &str = "cavi_survival_model.json";
pub const FEATURE_INFO_ARTIFACT: &str = "feature_info.json";

/// Tensor names of the model call contract.
pub const MODEL_INPUT: &str = "input";
pub const MODEL_OUTPUT: &str = "output";

pub const BINARY_MODEL_VERSION: &str = "CAVI-Enhanced 10-Year Mortality Predictor v1.0";
pub const SURVIVAL_MODEL_VERSION: &str = "DeepSurv Long-term Risk Profiler v1.0";
pub const BINARY_MODEL_NAME: &str = "CAVI-Enhanced Binary Classifier";
pub const SURVIVAL_MODEL_NAME: &str = "DeepSurv Survival Model";

/// Map a raw log-hazard output onto the 0..100 relative risk score
/// (50 = population average).
#[must_use]
pub fn survival_score(raw: f64) -> f64 {
    ((raw + 2.0) * 25.0).clamp(0.0, 100.0)
}

/// Feature metadata exported alongside the models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl FeatureInfo {
    /// Exported feature order must match the derived vector, when given.
    fn check_order(&self) -> Result<(), LoadError> {
        if self.feature_names.is_empty() {
            return Ok(());
        }
        let matches = self.feature_names.len() == FEATURE_NAMES.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .all(|(a, b)| a == b);
        if !matches {
            return Err(LoadError::FeatureInfo(format!(
                "feature order {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("{artifact}: {source}")]
    Model {
        artifact: &'static str,
        #[source]
        source: InferenceError,
    },

    #[error("feature_info.json: {0}")]
    FeatureInfo(String),
}

struct LoadedModels {
    binary: Box<dyn InferenceSession>,
    survival: Box<dyn InferenceSession>,
    feature_info: FeatureInfo,
}

/// Engine backed by the two trained models.
///
/// Loaded sessions are shared behind an `Arc`, so inference does not hold the
/// lock that guards loading.
pub struct ModelRiskEngine<R, A>
where
    R: InferenceRuntime,
    A: ArtifactSource,
{
    runtime: R,
    source: A,
    require_manifest: bool,
    models: RwLock<Option<Arc<LoadedModels>>>,
    load_lock: Mutex<()>,
}

impl ModelRiskEngine<DenseRuntime, FsArtifactSource> {
    /// Engine reading `dense-v1` models from the configured directory.
    #[must_use]
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(DenseRuntime::new(), FsArtifactSource::new(&config.model_dir))
            .with_required_manifest(config.require_manifest)
    }
}

impl<R, A> ModelRiskEngine<R, A>
where
    R: InferenceRuntime,
    A: ArtifactSource,
{
    #[must_use]
    pub fn new(runtime: R, source: A) -> Self {
        Self {
            runtime,
            source,
            require_manifest: false,
            models: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Fail initialization unless `manifest.json` binds every artifact.
    #[must_use]
    pub fn with_required_manifest(mut self, required: bool) -> Self {
        self.require_manifest = required;
        self
    }

    /// Feature metadata from the loaded artifact, once initialized.
    #[must_use]
    pub fn feature_info(&self) -> Option<FeatureInfo> {
        self.loaded().map(|m| m.feature_info.clone())
    }

    fn loaded(&self) -> Option<Arc<LoadedModels>> {
        match self.models.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    fn store(&self, models: Option<Arc<LoadedModels>>) {
        match self.models.write() {
            Ok(mut guard) => *guard = models,
            Err(poisoned) => *poisoned.into_inner() = models,
        }
    }

    fn load_manifest(&self) -> Result<Option<ModelManifest>, LoadError> {
        match self.source.fetch(MANIFEST_FILE) {
            Ok(bytes) => Ok(Some(ModelManifest::parse(&bytes)?)),
            Err(ArtifactError::NotFound(_)) if !self.require_manifest => Ok(None),
            Err(ArtifactError::NotFound(_)) => Err(ArtifactError::Integrity(format!(
                "{MANIFEST_FILE} is required but missing"
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_verified(
        &self,
        name: &str,
        manifest: Option<&ModelManifest>,
    ) -> Result<Vec<u8>, LoadError> {
        let bytes = self.source.fetch(name)?;
        if let Some(manifest) = manifest {
            manifest.verify(name, &bytes)?;
        }
        Ok(bytes)
    }

    fn load_session(
        &self,
        artifact: &'static str,
        manifest: Option<&ModelManifest>,
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceSession>, LoadError> {
        let bytes = self.fetch_verified(artifact, manifest)?;
        let model_err = |source: InferenceError| LoadError::Model { artifact, source };

        let session = self
            .runtime
            .load_session(&bytes, options)
            .map_err(model_err)?;
        if !session.input_names().iter().any(|n| n == MODEL_INPUT) {
            return Err(model_err(InferenceError::MissingInput(MODEL_INPUT.into())));
        }
        if !session.output_names().iter().any(|n| n == MODEL_OUTPUT) {
            return Err(model_err(InferenceError::MissingOutput(MODEL_OUTPUT.into())));
        }
        Ok(session)
    }

    fn load(&self) -> Result<LoadedModels, LoadError> {
        let options = SessionOptions::single_threaded_cpu();
        let manifest = self.load_manifest()?;
        if manifest.is_some() {
            tracing::info!("Verifying model artifacts against {MANIFEST_FILE}");
        }

        let binary = self.load_session(BINARY_MODEL_ARTIFACT, manifest.as_ref(), &options)?;
        let survival = self.load_session(SURVIVAL_MODEL_ARTIFACT, manifest.as_ref(), &options)?;

        let info_bytes = self.fetch_verified(FEATURE_INFO_ARTIFACT, manifest.as_ref())?;
        let feature_info: FeatureInfo = serde_json::from_slice(&info_bytes)
            .map_err(|e| LoadError::FeatureInfo(e.to_string()))?;
        feature_info.check_order()?;

        Ok(LoadedModels {
            binary,
            survival,
            feature_info,
        })
    }

    fn infer(&self, models: &LoadedModels, input: &PatientInput) -> Result<RiskResult, InferenceError> {
        let features = FeatureVector::derive(input);
        let binary_features = features.scaled(ModelFamily::Binary);
        let survival_features = features.scaled(ModelFamily::Survival);

        // The classifier already emits a probability.
        let binary_risk = f64::from(run_scalar(models.binary.as_ref(), &binary_features)?);
        let raw_survival = f64::from(run_scalar(models.survival.as_ref(), &survival_features)?);
        let survival_risk = survival_score(raw_survival);

        tracing::debug!(
            "Model estimate: binary={:.3}, raw_survival={:.3}, survival={:.1}",
            binary_risk,
            raw_survival,
            survival_risk
        );

        Ok(RiskResult::new(
            binary_risk,
            survival_risk,
            ModelVersions {
                binary: BINARY_MODEL_VERSION.to_string(),
                survival: SURVIVAL_MODEL_VERSION.to_string(),
            },
        ))
    }
}

fn run_scalar(session: &dyn InferenceSession, features: &FeatureVector) -> Result<f32, InferenceError> {
    let inputs = HashMap::from([(MODEL_INPUT.to_string(), Tensor::row(features.to_f32_vec()))]);
    let mut outputs = session.run(inputs)?;
    outputs
        .remove(MODEL_OUTPUT)
        .and_then(|t| t.first())
        .ok_or_else(|| InferenceError::MissingOutput(MODEL_OUTPUT.to_string()))
}

impl<R, A> RiskEngine for ModelRiskEngine<R, A>
where
    R: InferenceRuntime,
    A: ArtifactSource,
{
    fn initialize(&self) -> Result<(), CaviRiskError> {
        if self.loaded().is_some() {
            return Ok(());
        }

        let _guard = self.load_lock.lock().map_err(|_| {
            tracing::error!("Model load lock poisoned");
            CaviRiskError::ModelLoad
        })?;
        if self.loaded().is_some() {
            return Ok(());
        }

        tracing::info!("Loading risk models from {}...", self.source.describe());
        match self.load() {
            Ok(models) => {
                self.store(Some(Arc::new(models)));
                tracing::info!("Risk models loaded successfully");
                Ok(())
            }
            Err(e) => {
                self.store(None);
                tracing::error!("Error initializing models: {e}");
                Err(CaviRiskError::ModelLoad)
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.loaded().is_some()
    }

    fn calculate_risk(&self, input: &PatientInput) -> Result<RiskResult, CaviRiskError> {
        self.initialize()?;
        let models = self.loaded().ok_or(CaviRiskError::ModelLoad)?;

        self.infer(&models, input).map_err(|e| {
            tracing::error!("Error calculating risk: {e}");
            CaviRiskError::CalculationFailed
        })
    }

    fn model_names(&self) -> Vec<&'static str> {
        vec![BINARY_MODEL_NAME, SURVIVAL_MODEL_NAME]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::dense::{Activation, DenseLayer, ExportedDenseModel, DENSE_FORMAT};
    use crate::domain::{Sex, FEATURE_COUNT};
    use std::path::Path;
    use tempfile::tempdir;

    pub(crate) fn linear_model(weights: Vec<f32>, bias: f32, activation: Activation) -> ExportedDenseModel {
        ExportedDenseModel {
            format: DENSE_FORMAT.into(),
            name: None,
            input_name: MODEL_INPUT.into(),
            output_name: MODEL_OUTPUT.into(),
            n_features: FEATURE_COUNT,
            layers: vec![DenseLayer {
                weights: vec![weights],
                bias: vec![bias],
                activation,
            }],
        }
    }

    /// Writes a binary model with constant probability `p` (via a zero-weight
    /// identity layer) and a survival model with constant raw output.
    pub(crate) fn write_constant_models(dir: &Path, p: f32, raw_survival: f32) {
        let binary = linear_model(vec![0.0; FEATURE_COUNT], p, Activation::Identity);
        let survival = linear_model(vec![0.0; FEATURE_COUNT], raw_survival, Activation::Identity);
        write_artifacts(dir, &binary, &survival);
    }

    pub(crate) fn write_artifacts(dir: &Path, binary: &ExportedDenseModel, survival: &ExportedDenseModel) {
        std::fs::write(dir.join(BINARY_MODEL_ARTIFACT), serde_json::to_vec(binary).unwrap()).unwrap();
        std::fs::write(dir.join(SURVIVAL_MODEL_ARTIFACT), serde_json::to_vec(survival).unwrap()).unwrap();
        let info = FeatureInfo {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            target: Some("death_10y".into()),
            version: Some("1.0".into()),
        };
        std::fs::write(dir.join(FEATURE_INFO_ARTIFACT), serde_json::to_vec(&info).unwrap()).unwrap();
    }

    fn engine_for(dir: &Path) -> ModelRiskEngine<DenseRuntime, FsArtifactSource> {
        ModelRiskEngine::new(DenseRuntime::new(), FsArtifactSource::new(dir))
    }

    fn patient() -> PatientInput {
        PatientInput::new(65.0, Sex::Male, 9.5, 1.1, 42.5, 14.2)
    }

    #[test]
    fn test_survival_score_mapping() {
        assert_eq!(survival_score(0.0), 50.0);
        assert_eq!(survival_score(-2.0), 0.0);
        assert_eq!(survival_score(-5.0), 0.0);
        assert_eq!(survival_score(2.0), 100.0);
        assert_eq!(survival_score(7.5), 100.0);
        assert!(survival_score(f64::NAN).is_nan());
    }

    #[test]
    fn test_raw_survival_zero_maps_to_average() {
        let dir = tempdir().expect("tempdir");
        write_constant_models(dir.path(), 0.3, 0.0);

        let engine = engine_for(dir.path());
        let result = engine.calculate_risk(&patient()).expect("inference");

        assert_eq!(result.survival_risk, 50.0);
        assert!((result.binary_risk - 0.3).abs() < 1e-6);
        assert_eq!(result.model_versions.binary, BINARY_MODEL_VERSION);
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_binary_output_is_not_clamped() {
        let dir = tempdir().expect("tempdir");
        write_constant_models(dir.path(), 1.25, 0.0);

        let result = engine_for(dir.path()).calculate_risk(&patient()).expect("inference");
        assert!((result.binary_risk - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_scaled_features_reach_the_model() {
        let dir = tempdir().expect("tempdir");
        // Survival output = scaled age.
        let mut w = vec![0.0; FEATURE_COUNT];
        w[0] = 1.0;
        let binary = linear_model(vec![0.0; FEATURE_COUNT], 0.0, Activation::Sigmoid);
        let survival = linear_model(w, 0.0, Activation::Identity);
        write_artifacts(dir.path(), &binary, &survival);

        let result = engine_for(dir.path()).calculate_risk(&patient()).expect("inference");
        let scaled_age = (65.0 - 67.2) / 12.8;
        assert!((result.survival_risk - survival_score(scaled_age)).abs() < 1e-3);
        assert!((result.binary_risk - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_initialize_is_idempotent_and_loads_feature_info() {
        let dir = tempdir().expect("tempdir");
        write_constant_models(dir.path(), 0.1, 0.0);
        let engine = engine_for(dir.path());

        assert!(!engine.is_initialized());
        engine.initialize().expect("load");
        // Removing artifacts after load must not matter.
        std::fs::remove_file(dir.path().join(BINARY_MODEL_ARTIFACT)).unwrap();
        engine.initialize().expect("already loaded");
        assert!(engine.is_initialized());
        assert_eq!(engine.feature_info().unwrap().version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_missing_artifacts_fail_to_load() {
        let dir = tempdir().expect("tempdir");
        let engine = engine_for(dir.path());

        let err = engine.initialize().expect_err("must fail");
        assert!(matches!(err, CaviRiskError::ModelLoad));
        assert!(!engine.is_initialized());
        assert!(matches!(
            engine.calculate_risk(&patient()),
            Err(CaviRiskError::ModelLoad)
        ));
    }

    #[test]
    fn test_feature_order_drift_fails_to_load() {
        let dir = tempdir().expect("tempdir");
        write_constant_models(dir.path(), 0.1, 0.0);
        let info = FeatureInfo {
            feature_names: vec!["age".into(), "sex".into()],
            ..FeatureInfo::default()
        };
        std::fs::write(dir.path().join(FEATURE_INFO_ARTIFACT), serde_json::to_vec(&info).unwrap()).unwrap();

        assert!(engine_for(dir.path()).initialize().is_err());
    }

    #[test]
    fn test_wrong_input_width_fails_at_inference() {
        let dir = tempdir().expect("tempdir");
        let mut binary = linear_model(vec![0.0; 9], 0.1, Activation::Identity);
        binary.n_features = 9;
        let survival = linear_model(vec![0.0; FEATURE_COUNT], 0.0, Activation::Identity);
        write_artifacts(dir.path(), &binary, &survival);

        let engine = engine_for(dir.path());
        engine.initialize().expect("shapes are only checked per call");
        assert!(matches!(
            engine.calculate_risk(&patient()),
            Err(CaviRiskError::CalculationFailed)
        ));
    }

    #[test]
    fn test_manifest_is_enforced() {
        let dir = tempdir().expect("tempdir");
        write_constant_models(dir.path(), 0.1, 0.0);

        // Required but absent.
        let strict = engine_for(dir.path()).with_required_manifest(true);
        assert!(strict.initialize().is_err());

        // Present and matching.
        let read = |name: &str| std::fs::read(dir.path().join(name)).unwrap();
        let (b, s, f) = (
            read(BINARY_MODEL_ARTIFACT),
            read(SURVIVAL_MODEL_ARTIFACT),
            read(FEATURE_INFO_ARTIFACT),
        );
        let manifest = ModelManifest::from_artifacts([
            (BINARY_MODEL_ARTIFACT, b.as_slice()),
            (SURVIVAL_MODEL_ARTIFACT, s.as_slice()),
            (FEATURE_INFO_ARTIFACT, f.as_slice()),
        ]);
        std::fs::write(dir.path().join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();
        let strict = engine_for(dir.path()).with_required_manifest(true);
        strict.initialize().expect("manifest matches");

        // Tampered artifact.
        write_constant_models(dir.path(), 0.9, 0.0);
        std::fs::write(dir.path().join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();
        assert!(engine_for(dir.path()).initialize().is_err());
    }

    #[test]
    fn test_shipped_models_load() {
        let config = RiskConfig {
            model_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("models"),
            ..RiskConfig::default()
        };
        let engine = ModelRiskEngine::from_config(&config);
        engine.initialize().expect("shipped models should load");

        let result = engine.calculate_risk(&patient()).expect("inference");
        assert!((0.0..=1.0).contains(&result.binary_risk));
        assert!((0.0..=100.0).contains(&result.survival_risk));
    }
}
