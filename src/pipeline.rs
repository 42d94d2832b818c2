//! The asset pipeline: four named tasks and one aggregate.
//!
//! ```text
//! config ─────────────► html
//! script.vendor ──┐
//!                 ├───► script
//! script.main ────┘
//! ```

use std::sync::Arc;

use crate::blueprint::{Blueprint, Website};
use crate::bundle::{self, Bundle};
use crate::core::BuildInfo;
use crate::engine::Handle;
use crate::fingerprint::{self, Fingerprint};
use crate::output::Output;
use crate::settings::Project;
use crate::template;

pub const CONFIG: &str = "config";
pub const SCRIPT_VENDOR: &str = "script.vendor";
pub const SCRIPT_MAIN: &str = "script.main";
pub const SCRIPT: &str = "script";
pub const HTML: &str = "html";

/// Handles to every task of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Tasks {
    pub config: Handle<Fingerprint>,
    pub vendor: Handle<Bundle>,
    pub main: Handle<Bundle>,
    pub script: Handle<()>,
    pub html: Handle<Vec<Output>>,
}

/// Declares the pipeline tasks for a project.
pub fn design(blueprint: &mut Blueprint<BuildInfo>, project: Arc<Project>) -> Tasks {
    let config = {
        let project = project.clone();
        blueprint
            .task()
            .name(CONFIG)
            .run(move |_| Ok(fingerprint::run(&project)?))
    };

    let vendor = {
        let project = project.clone();
        blueprint
            .task()
            .name(SCRIPT_VENDOR)
            .run(move |_| Ok(bundle::bundle(&project, "vendor", &project.settings.vendor)?))
    };

    let main = {
        let project = project.clone();
        blueprint
            .task()
            .name(SCRIPT_MAIN)
            .run(move |_| Ok(bundle::bundle(&project, "main", &project.settings.main)?))
    };

    let script = blueprint
        .task()
        .name(SCRIPT)
        .depends_on((vendor, main))
        .run(|_, (vendor, main)| {
            tracing::info!("Scripts ready: {vendor}, {main}");
            Ok(())
        });

    let html = blueprint
        .task()
        .name(HTML)
        .depends_on(config)
        .run(move |ctx, fingerprint| {
            Ok(template::render(&project, fingerprint, &ctx.env.data)?)
        });

    Tasks {
        config,
        vendor,
        main,
        script,
        html,
    }
}

/// Builds the finished task graph for a project.
pub fn website(project: Arc<Project>) -> Website<BuildInfo> {
    let mut blueprint = Blueprint::new();
    design(&mut blueprint, project);
    blueprint.finish()
}
