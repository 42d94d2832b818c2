//! Build settings and the loaded project.
//!
//! Defaults live in code. A `"hanko"` object in `package.json` is merged on
//! top of them key by key, so overriding `main.minify` leaves the rest of the
//! `main` bundle settings untouched.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManifestError;
use crate::manifest::PackageManifest;

/// A command line to run, split into the program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a single script bundle is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSettings {
    /// Entry module, relative to the project root.
    pub entry: Utf8PathBuf,
    /// Emitted script, relative to the output tree.
    pub outfile: Utf8PathBuf,
    /// Name of the global variable the IIFE result is assigned to.
    pub name: String,
    pub sourcemap: bool,
    pub minify: bool,
    /// Resolve `browser` package fields first and polyfill `global` and
    /// `process` for modules written for Node.
    pub node_globals: bool,
    /// Modules left out of the bundle, mapped to the global variable that
    /// provides them at runtime.
    pub externals: BTreeMap<String, String>,
}

impl BundleSettings {
    pub fn vendor() -> Self {
        Self {
            entry: "src/scripts/vendor.js".into(),
            outfile: "scripts/vendor.js".into(),
            name: "vendor".into(),
            sourcemap: false,
            minify: false,
            node_globals: true,
            externals: BTreeMap::new(),
        }
    }

    pub fn main() -> Self {
        Self {
            entry: "src/scripts/main.js".into(),
            outfile: "scripts/main.js".into(),
            name: "main".into(),
            sourcemap: true,
            minify: false,
            node_globals: false,
            externals: BTreeMap::from([
                ("jquery".to_string(), "$".to_string()),
                ("axios".to_string(), "axios".to_string()),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Source tree holding the HTML templates.
    pub src: Utf8PathBuf,
    /// Output tree.
    pub dist: Utf8PathBuf,
    /// Glob for HTML templates, relative to `src`.
    pub html: String,
    /// Scratch directory for generated shim modules.
    pub cache: Utf8PathBuf,
    /// Explicit esbuild binary, otherwise `node_modules/.bin/esbuild` or `PATH`.
    pub esbuild: Option<Utf8PathBuf>,
    /// Explicit esbuild targets, otherwise derived from `browserslist`.
    pub target: Option<Vec<String>>,
    /// Command listing installed dependencies as JSON.
    pub package_manager: CommandSpec,
    pub vendor: BundleSettings,
    pub main: BundleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            src: "src".into(),
            dist: "dist".into(),
            html: "**/*.html".into(),
            cache: ".cache/hanko".into(),
            esbuild: None,
            target: None,
            package_manager: CommandSpec::new("npm", ["ls", "--depth=0", "--json"]),
            vendor: BundleSettings::vendor(),
            main: BundleSettings::main(),
        }
    }
}

impl Settings {
    /// Applies overrides on top of the defaults.
    pub fn with_overrides(overrides: Option<&Value>) -> Result<Self, serde_json::Error> {
        let Some(overrides) = overrides else {
            return Ok(Self::default());
        };

        let mut base = serde_json::to_value(Self::default())?;
        merge(&mut base, overrides);
        serde_json::from_value(base)
    }
}

fn merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// A project on disk: its root, manifest and effective settings.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: Utf8PathBuf,
    pub manifest: PackageManifest,
    pub settings: Settings,
}

impl Project {
    pub const MANIFEST: &'static str = "package.json";

    /// Reads `package.json` under `root` and resolves the settings.
    pub fn load(root: impl Into<Utf8PathBuf>) -> Result<Self, ManifestError> {
        let root = root.into();
        let path = root.join(Self::MANIFEST);
        let manifest = PackageManifest::load(&path)?;
        let settings = Settings::with_overrides(manifest.hanko.as_ref())
            .map_err(|e| ManifestError::Json(path.to_string(), e))?;

        Ok(Self {
            root,
            manifest,
            settings,
        })
    }

    pub fn new(root: impl Into<Utf8PathBuf>, manifest: PackageManifest, settings: Settings) -> Self {
        Self {
            root: root.into(),
            manifest,
            settings,
        }
    }

    pub fn path(&self, relative: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.root.join(relative)
    }

    pub fn src_dir(&self) -> Utf8PathBuf {
        self.path(&self.settings.src)
    }

    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.path(&self.settings.dist)
    }

    /// Where a bundle is emitted, relative to the project root.
    pub fn outfile(&self, bundle: &BundleSettings) -> Utf8PathBuf {
        self.settings.dist.join(&bundle.outfile)
    }

    /// Targets passed to esbuild for syntax lowering.
    pub fn esbuild_targets(&self) -> Vec<String> {
        let targets = match &self.settings.target {
            Some(targets) => targets.clone(),
            None => self
                .manifest
                .browserslist
                .as_ref()
                .map(|list| list.esbuild_targets())
                .unwrap_or_default(),
        };

        if targets.is_empty() {
            vec!["es2015".to_string()]
        } else {
            targets
        }
    }
}
