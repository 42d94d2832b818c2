use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use console::style;
use hanko::{BuildInfo, HankoError, Project, pipeline};

/// Bundle, fingerprint and stamp client-side assets.
#[derive(Parser, Debug, Clone)]
#[command(name = "hanko", version)]
struct Args {
    /// Tasks to run: config, script.vendor, script.main, script, html.
    /// Runs every task when none are given.
    tasks: Vec<String>,

    /// Project root containing package.json.
    #[arg(short = 'C', long, default_value = ".")]
    root: Utf8PathBuf,

    /// Print the task graph as a Mermaid diagram and exit.
    #[arg(long)]
    list: bool,

    /// Write a Mermaid graph of task outcomes to this file.
    #[arg(long)]
    graph: Option<Utf8PathBuf>,

    /// Write an SVG waterfall of task timings to this file.
    #[arg(long)]
    waterfall: Option<Utf8PathBuf>,

    /// Enable debug output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let build = BuildInfo::now();
    let args = Args::parse();

    hanko::init_logging(args.verbose)?;

    let project = Arc::new(Project::load(&args.root)?);
    let website = pipeline::website(project.clone());

    if args.list {
        print!("{website}");
        return Ok(());
    }

    eprintln!(
        "Running {} build {}",
        style("hanko").red(),
        style(build.bundle_version).blue()
    );

    let (diagnostics, result) =
        match website.build(build, project.dist_dir(), args.tasks.as_slice()) {
            Ok(diagnostics) => (diagnostics, Ok(())),
            Err(HankoError::Build(err, diagnostics)) => (*diagnostics, Err(err)),
            Err(err) => return Err(err.into()),
        };

    if let Some(path) = &args.graph {
        diagnostics.render_mermaid_to_file(&website, path)?;
        tracing::info!("Wrote task graph to {path}");
    }

    if let Some(path) = &args.waterfall {
        diagnostics.render_waterfall_to_file(&website, path)?;
        tracing::info!("Wrote task waterfall to {path}");
    }

    Ok(result?)
}
