//! Artifact source port: Trait for fetching static model artifacts.
//!
//! Loading is pass/fail: no caching headers, no version negotiation.

/// Errors that can occur while fetching an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact integrity check failed: {0}")]
    Integrity(String),

    #[error("Invalid artifact format for {path}: {reason}")]
    Format { path: String, reason: String },
}

/// Trait for loading artifacts by relative path.
pub trait ArtifactSource: Send + Sync {
    /// Fetch the full contents of an artifact.
    ///
    /// # Errors
    /// Returns `ArtifactError::NotFound` when the artifact does not exist and
    /// other variants for unreadable or disallowed paths.
    fn fetch(&self, relative_path: &str) -> Result<Vec<u8>, ArtifactError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
