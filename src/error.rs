use std::process::ExitStatus;

use thiserror::Error;

use crate::engine::Diagnostics;

#[derive(Debug, Error)]
pub enum HankoError {
    #[error("Couldn't read the project manifest.\n{0}")]
    Manifest(#[from] ManifestError),

    #[error("Unknown task '{0}', available tasks: {1}")]
    UnknownTask(String, String),

    #[error("Cycle detected in task graph at task '{0}'")]
    Cycle(String),

    #[error("Error while writing outputs:\n{0}")]
    Output(#[from] std::io::Error),

    #[error("Error while building.\n{0}")]
    Build(BuildError, Box<Diagnostics>),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Couldn't read '{0}'.\n{1}")]
    Io(String, std::io::Error),

    #[error("Couldn't parse '{0}'.\n{1}")]
    Json(String, serde_json::Error),
}

/// Errors that can occur while fingerprinting installed dependencies.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The package manager couldn't be started.
    #[error("Couldn't run '{0}'.\n{1}")]
    Spawn(String, std::io::Error),

    /// The package manager returned a non-zero exit code.
    #[error("'{program}' exited with {status}.\n{stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Package manager output is not UTF-8.\n{0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Package manager output is not a valid dependency listing.\n{0}")]
    Listing(#[from] serde_json::Error),

    #[error("Declared dependency '{0}' is not installed")]
    NotInstalled(String),

    #[error("Installed dependency '{0}' has no version")]
    NoVersion(String),
}

/// Errors that can occur when bundling scripts.
#[derive(Debug, Error)]
pub enum BundleError {
    /// An I/O error occurred while preparing the bundle or reading the result.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The esbuild process couldn't be started.
    #[error("Couldn't run esbuild at '{0}'.\n{1}")]
    Spawn(String, std::io::Error),

    /// The esbuild process returned a non-zero exit code.
    #[error("Esbuild execution failed: {0}")]
    Esbuild(String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Template '{0}' is outside of '{1}'")]
    OutsideSource(String, String),

    #[error("Couldn't read template '{0}'.\n{1}")]
    Read(String, std::io::Error),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Task '{0}':\n{1:#}")]
    Task(String, anyhow::Error),

    #[error("{} tasks failed:\n{}", .0.len(), format_failures(.0))]
    Tasks(Vec<BuildError>),
}

fn format_failures(failures: &[BuildError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl BuildError {
    pub(crate) fn from_failures(mut failures: Vec<BuildError>) -> Self {
        if failures.len() == 1 {
            failures.remove(0)
        } else {
            BuildError::Tasks(failures)
        }
    }

    /// Names of all tasks that failed.
    pub fn failed_tasks(&self) -> Vec<&str> {
        match self {
            BuildError::Task(name, _) => vec![name.as_str()],
            BuildError::Tasks(all) => all.iter().flat_map(BuildError::failed_tasks).collect(),
        }
    }
}
