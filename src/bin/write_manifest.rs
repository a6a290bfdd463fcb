//! Digest manifest writer for exported CaviRisk models.
//!
//! Hashes the model artifacts in a directory and writes `manifest.json`
//! next to them. With `CAVIRISK_REQUIRE_MODEL_MANIFEST=1` the runtime refuses
//! artifacts whose digest does not match.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin write_manifest -- <model_dir> [--output <path>]
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;

use cavirisk::adapters::fs_source::MANIFEST_FILE;
use cavirisk::adapters::ModelManifest;
use cavirisk::application::model_engine::{
    BINARY_MODEL_ARTIFACT, FEATURE_INFO_ARTIFACT, SURVIVAL_MODEL_ARTIFACT,
};

const ARTIFACTS: [&str; 3] = [
    BINARY_MODEL_ARTIFACT,
    SURVIVAL_MODEL_ARTIFACT,
    FEATURE_INFO_ARTIFACT,
];

fn usage() -> String {
    "Usage: write_manifest <model_dir> [--output <path>]".to_string()
}

fn parse_args() -> Result<(PathBuf, Option<PathBuf>), String> {
    let mut args = env::args().skip(1);
    let mut model_dir: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" => {
                let v = args.next().ok_or_else(usage)?;
                output = Some(PathBuf::from(v));
            }
            "-h" | "--help" => return Err(usage()),
            other if other.starts_with('-') => {
                return Err(format!("Unknown option {other}\n{}", usage()));
            }
            other => {
                if model_dir.is_some() {
                    return Err(usage());
                }
                model_dir = Some(PathBuf::from(other));
            }
        }
    }

    let model_dir = model_dir.ok_or_else(usage)?;
    Ok((model_dir, output))
}

fn run() -> Result<PathBuf, String> {
    let (model_dir, output) = parse_args()?;

    let mut contents = Vec::with_capacity(ARTIFACTS.len());
    for name in ARTIFACTS {
        let path = model_dir.join(name);
        let bytes = fs::read(&path).map_err(|e| format!("Failed to read {path:?}: {e}"))?;
        contents.push((name, bytes));
    }

    let manifest =
        ModelManifest::from_artifacts(contents.iter().map(|(name, bytes)| (*name, bytes.as_slice())));
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| format!("Failed to serialize manifest: {e}"))?;

    let output = output.unwrap_or_else(|| model_dir.join(MANIFEST_FILE));
    fs::write(&output, format!("{json}\n"))
        .map_err(|e| format!("Failed to write {output:?}: {e}"))?;

    for (name, digest) in &manifest.files {
        println!("{digest}  {name}");
    }
    Ok(output)
}

fn main() {
    match run() {
        Ok(path) => println!("Wrote {}", path.display()),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    }
}
