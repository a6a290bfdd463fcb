//! Filesystem artifact source and model manifest verification.
//!
//! Artifacts are resolved relative to a root directory. An optional
//! `manifest.json` binds each artifact to its SHA-256 digest; it is written by
//! the `write_manifest` tool.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ports::{ArtifactError, ArtifactSource};

/// File name of the integrity manifest inside the model directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Only manifest version understood by this build.
pub const MANIFEST_VERSION: u32 = 1;

/// Artifact source rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsArtifactSource {
    root: PathBuf,
}

impl FsArtifactSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, ArtifactError> {
        let rel = Path::new(relative_path.trim_start_matches("./"));
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative_path.is_empty() || escapes {
            return Err(ArtifactError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl ArtifactSource for FsArtifactSource {
    fn fetch(&self, relative_path: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.resolve(relative_path)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(relative_path.to_string())
            } else {
                ArtifactError::Io {
                    path: relative_path.to_string(),
                    source: e,
                }
            }
        })
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Digest manifest binding artifact names to SHA-256 hex digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub files: BTreeMap<String, String>,
}

impl ModelManifest {
    /// Build a manifest over the given artifacts.
    #[must_use]
    pub fn from_artifacts<'a, I>(artifacts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let files = artifacts
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), sha256_hex(bytes)))
            .collect();
        Self {
            version: MANIFEST_VERSION,
            created_at: Some(chrono::Utc::now()),
            files,
        }
    }

    /// Parse and version-check manifest bytes.
    ///
    /// # Errors
    /// Returns `ArtifactError::Format` for malformed JSON or an unknown version.
    pub fn parse(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let manifest: Self = serde_json::from_slice(bytes).map_err(|e| ArtifactError::Format {
            path: MANIFEST_FILE.to_string(),
            reason: e.to_string(),
        })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Format {
                path: MANIFEST_FILE.to_string(),
                reason: format!("unsupported manifest version {}", manifest.version),
            });
        }
        Ok(manifest)
    }

    /// Check that `name` is bound by the manifest and its contents match.
    ///
    /// # Errors
    /// Returns `ArtifactError::Integrity` if the artifact is unlisted or its
    /// digest differs.
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let expected = self
            .files
            .get(name)
            .ok_or_else(|| ArtifactError::Integrity(format!("{name} is not listed in the manifest")))?;
        let actual = sha256_hex(bytes);
        if !constant_time_eq_str(&actual, expected) {
            return Err(ArtifactError::Integrity(format!("digest mismatch for {name}")));
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn constant_time_eq_str(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fetch_reads_relative_file() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("feature_info.json"), b"{}").expect("write");

        let source = FsArtifactSource::new(dir.path());
        assert_eq!(source.fetch("feature_info.json").expect("fetch"), b"{}");
        assert_eq!(source.fetch("./feature_info.json").expect("fetch"), b"{}");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let source = FsArtifactSource::new(dir.path());
        assert!(matches!(
            source.fetch("cavi_binary_model.json"),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let source = FsArtifactSource::new("models");
        for bad in ["../secrets.json", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(source.fetch(bad), Err(ArtifactError::InvalidPath(_))),
                "{bad} must be rejected"
            );
        }
    }

    #[test]
    fn test_manifest_verify() {
        let manifest = ModelManifest::from_artifacts([("model.json", b"abc".as_slice())]);
        assert!(manifest.verify("model.json", b"abc").is_ok());
        assert!(matches!(
            manifest.verify("model.json", b"abd"),
            Err(ArtifactError::Integrity(_))
        ));
        assert!(matches!(
            manifest.verify("other.json", b"abc"),
            Err(ArtifactError::Integrity(_))
        ));
    }

    #[test]
    fn test_manifest_roundtrip_and_version_check() {
        let manifest = ModelManifest::from_artifacts([("a", b"1".as_slice())]);
        let bytes = serde_json::to_vec(&manifest).expect("serialize");
        assert_eq!(ModelManifest::parse(&bytes).expect("parse"), manifest);

        let mut future = manifest;
        future.version = 2;
        let bytes = serde_json::to_vec(&future).expect("serialize");
        assert!(matches!(
            ModelManifest::parse(&bytes),
            Err(ArtifactError::Format { .. })
        ));
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
