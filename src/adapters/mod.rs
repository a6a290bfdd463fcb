//! Adapters layer: Concrete implementations of ports.
//!
//! - `dense`: runtime for feed-forward models exported as JSON
//! - `fs_source`: artifact loading from a model directory, with digest manifest
//! - `sanitize`: redaction of measurements and identifiers in logs

pub mod dense;
pub mod fs_source;
pub mod sanitize;

pub use dense::DenseRuntime;
pub use fs_source::{FsArtifactSource, ModelManifest};
