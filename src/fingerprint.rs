//! Dependency fingerprinting.
//!
//! The fingerprint is a digest over the versions of the declared runtime
//! dependencies as they are actually installed. It changes whenever any of
//! them is upgraded, which makes it usable for cache-busting vendor code.

use std::collections::HashMap;
use std::process::{Command, Stdio};

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::Hash32;
use crate::error::FingerprintError;
use crate::manifest::PackageManifest;
use crate::settings::{CommandSpec, Project};

/// Installed versions of the declared dependencies and their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Declared dependency name to installed version, in manifest order.
    pub installed: Map<String, Value>,
    pub digest: Hash32,
}

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.digest.to_hex()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The shape of `npm ls --json`, reduced to what is needed here.
#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    dependencies: HashMap<String, Installed>,
}

#[derive(Debug, Deserialize)]
struct Installed {
    version: Option<String>,
}

/// Runs the package manager and fingerprints its listing.
pub fn run(project: &Project) -> Result<Fingerprint, FingerprintError> {
    let listing = list_installed(&project.root, &project.settings.package_manager)?;
    let fingerprint = fingerprint(&project.manifest, &listing)?;

    let installed = Value::Object(fingerprint.installed.clone());
    tracing::info!("Installed dependencies: {installed}");

    Ok(fingerprint)
}

/// Runs the dependency listing command in `root` and returns its stdout.
pub fn list_installed(root: &Utf8Path, command: &CommandSpec) -> Result<String, FingerprintError> {
    tracing::debug!("Running '{command}' in {root}");

    let output = Command::new(&command.program)
        .args(&command.args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| FingerprintError::Spawn(command.to_string(), e))?;

    if !output.status.success() {
        return Err(FingerprintError::Exit {
            program: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8(output.stdout)?)
}

/// Computes the fingerprint of the declared dependencies from a listing.
///
/// The installed versions are serialized as compact JSON in manifest key
/// order, e.g. `{"a":"1.0.2","b":"2.1.0"}`, and the digest is taken over that
/// string.
pub fn fingerprint(
    manifest: &PackageManifest,
    listing: &str,
) -> Result<Fingerprint, FingerprintError> {
    let listing: Listing = serde_json::from_str(listing)?;

    let mut installed = Map::new();
    for name in manifest.dependency_names() {
        let version = listing
            .dependencies
            .get(name)
            .ok_or_else(|| FingerprintError::NotInstalled(name.to_string()))?
            .version
            .clone()
            .ok_or_else(|| FingerprintError::NoVersion(name.to_string()))?;

        installed.insert(name.to_string(), Value::String(version));
    }

    let canonical = serde_json::to_string(&installed)?;
    let digest = Hash32::hash(canonical);

    Ok(Fingerprint { installed, digest })
}
