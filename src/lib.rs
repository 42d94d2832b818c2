#![forbid(unsafe_code)]
//! Task-graph build runner for client-side web assets.
//!
//! `hanko` bundles a vendor script and a main script with esbuild,
//! fingerprints the installed runtime dependencies of a project, and stamps
//! both the fingerprint and the build timestamp into the project's HTML
//! templates. The work is declared as a graph of named tasks which runs in
//! parallel wherever the dependencies allow it.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hanko::{BuildInfo, Project, pipeline};
//!
//! let build = BuildInfo::now();
//! let project = Arc::new(Project::load(".")?);
//! let website = pipeline::website(project.clone());
//!
//! website.build(build, project.dist_dir(), &["html", "script"])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod blueprint;
pub mod bundle;
mod core;
pub mod engine;
mod error;
pub mod fingerprint;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod template;
mod utils;

pub use crate::blueprint::{Blueprint, Website};
pub use crate::core::{BuildInfo, Environment, Hash32, TaskContext};
pub use crate::engine::{Diagnostics, Handle, TaskState};
pub use crate::error::*;
pub use crate::output::Output;
pub use crate::settings::{Project, Settings};
pub use crate::utils::init_logging;
