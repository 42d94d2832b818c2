mod diagnostics;

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use indicatif::ProgressStyle;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::blueprint::Website;
use crate::core::Dynamic;
use crate::error::{BuildError, HankoError};
use crate::{Environment, Output, TaskContext};

pub use diagnostics::Diagnostics;

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Final state of a selected task once the graph has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// The task ran and produced an output.
    Done,
    /// The task ran and returned an error or panicked.
    Failed,
    /// The task never ran because one of its dependencies failed.
    Skipped,
}

/// Everything the runner learned while executing the graph.
pub(crate) struct Report {
    pub cache: HashMap<NodeIndex, Dynamic>,
    pub failures: Vec<BuildError>,
    pub diagnostics: Diagnostics,
}

/// Returns the given targets together with everything they transitively
/// depend on.
pub(crate) fn select<G: Send + Sync>(
    website: &Website<G>,
    targets: &[NodeIndex],
) -> HashSet<NodeIndex> {
    let reversed = Reversed(&website.graph);
    let mut selected = HashSet::new();

    for &target in targets {
        let mut dfs = Dfs::new(reversed, target);
        while let Some(index) = dfs.next(reversed) {
            selected.insert(index);
        }
    }

    selected
}

pub(crate) fn check_acyclic<G: Send + Sync>(website: &Website<G>) -> Result<(), HankoError> {
    petgraph::algo::toposort(&website.graph, None)
        .map(|_| ())
        .map_err(|cycle| HankoError::Cycle(website.graph[cycle.node_id()].get_name()))
}

/// This function executes the task graph using a thread pool. It performs a
/// parallel topological sort of the graph, where tasks are executed as soon as
/// their dependencies are met.
///
/// The algorithm works as follows:
/// 1. Tasks are spawned on the Rayon pool inside an in-place scope, and a
///    channel is used to receive results back on the calling thread, which is
///    not itself a pool worker.
/// 2. The initial set of tasks (those with no selected dependencies) is
///    spawned.
/// 3. The calling thread waits for results. When a task completes, its result
///    is cached and the dependency counts of its dependents are decremented.
///    A dependent whose count reaches zero is spawned.
/// 4. When a task fails, every selected task that transitively depends on it
///    is marked as skipped and never spawned.
/// 5. The loop continues until every selected task has settled.
pub(crate) fn run_tasks_parallel<G: Send + Sync>(
    site: &Website<G>,
    globals: &Environment<G>,
    nodes_to_run: &HashSet<NodeIndex>,
) -> anyhow::Result<Report> {
    // Build a map from a dependency to the nodes that depend on it for the entire graph.
    let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for edge in site.graph.raw_edges() {
        dependents
            .entry(edge.source())
            .or_default()
            .push(edge.target());
    }

    // A dependency only counts if it's also in the set of nodes to run.
    let mut dependency_counts: HashMap<NodeIndex, usize> = nodes_to_run
        .iter()
        .map(|&i| {
            (
                i,
                site.graph
                    .neighbors_directed(i, petgraph::Direction::Incoming)
                    .filter(|dep| nodes_to_run.contains(dep))
                    .count(),
            )
        })
        .collect();

    let mut cache = HashMap::new();
    let mut failures = Vec::new();
    let mut diagnostics = Diagnostics::default();

    let total_tasks = nodes_to_run.len();
    let mut settled = 0;

    if total_tasks == 0 {
        return Ok(Report {
            cache,
            failures,
            diagnostics,
        });
    }

    let root_span = tracing::span!(Level::INFO, "running_tasks");
    root_span.pb_set_length(total_tasks as u64);
    root_span.pb_set_style(
        &ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=>-"),
    );
    root_span.pb_set_message("Running tasks...");
    let _enter = root_span.enter();

    let pb_style = crate::utils::get_style_task()?;

    rayon::in_place_scope(|s| {
        let (result_sender, result_receiver) =
            channel::<(NodeIndex, anyhow::Result<Dynamic>, TaskExecution)>();

        // A helper closure to spawn a task
        let spawn_task = |cache: &HashMap<NodeIndex, Dynamic>, index: NodeIndex| {
            let dependencies: Vec<Dynamic> = site.graph[index]
                .dependencies()
                .iter()
                .map(|dep| cache[dep].clone())
                .collect();

            let task = site.graph[index].clone();
            let sender = result_sender.clone();
            let pb_style = pb_style.clone();
            let parent = root_span.clone();

            s.spawn(move |_| {
                let name = task.get_name();
                let span = tracing::span!(parent: &parent, Level::INFO, "task", name = name.as_str());
                span.pb_set_style(&pb_style);
                span.pb_set_message(&format!("Running {name}"));
                let _enter = span.enter();

                let context = TaskContext { env: globals };

                let start = Instant::now();

                // A panicking task only touches its own cloned inputs, so the
                // rest of the graph can keep going.
                let output = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    task.execute(&context, &dependencies)
                })) {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                            format!("Task panicked: {s}")
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            format!("Task panicked: {s}")
                        } else {
                            String::from("Task panicked with unknown payload")
                        };

                        Err(anyhow::anyhow!(msg))
                    }
                };

                let execution = TaskExecution {
                    start,
                    duration: start.elapsed(),
                };

                // The receiver outlives every spawned task.
                let _ = sender.send((index, output, execution));
            });
        };

        // Seed initial tasks
        for &index in nodes_to_run {
            if dependency_counts.get(&index).copied().unwrap_or(0) == 0 {
                spawn_task(&cache, index);
            }
        }

        // Scheduler loop
        while settled < total_tasks {
            let Ok((index, output, execution)) = result_receiver.recv() else {
                break;
            };

            settled += 1;
            root_span.pb_inc(1);
            diagnostics.execution_times.insert(index, execution);

            match output {
                Ok(output) => {
                    tracing::debug!("Finished {}", site.graph[index].get_name());
                    cache.insert(index, output);
                    diagnostics.states.insert(index, TaskState::Done);

                    for &dependent in dependents.get(&index).into_iter().flatten() {
                        if let Some(count) = dependency_counts.get_mut(&dependent) {
                            *count -= 1;
                            if *count == 0 {
                                spawn_task(&cache, dependent);
                            }
                        }
                    }
                }
                Err(error) => {
                    let name = site.graph[index].get_name();
                    tracing::error!("Task '{name}' failed: {error:#}");
                    diagnostics.states.insert(index, TaskState::Failed);
                    failures.push(BuildError::Task(name, error));

                    let mut dfs = Dfs::new(&site.graph, index);
                    while let Some(next) = dfs.next(&site.graph) {
                        if next == index || !nodes_to_run.contains(&next) {
                            continue;
                        }
                        if diagnostics.states.contains_key(&next) {
                            continue;
                        }

                        tracing::warn!("Skipping '{}'", site.graph[next].get_name());
                        diagnostics.states.insert(next, TaskState::Skipped);
                        settled += 1;
                        root_span.pb_inc(1);
                    }
                }
            }
        }
    });

    tracing::info!("Ran {} tasks", diagnostics.execution_times.len());

    Ok(Report {
        cache,
        failures,
        diagnostics,
    })
}

pub(crate) fn collect_outputs(cache: &HashMap<NodeIndex, Dynamic>) -> Vec<Output> {
    let mut outputs: Vec<Output> = Vec::new();
    for value in cache.values() {
        if let Some(output) = value.downcast_ref::<Output>() {
            outputs.push(output.clone());
        } else if let Some(output_vec) = value.downcast_ref::<Vec<Output>>() {
            outputs.extend(output_vec.iter().cloned());
        }
    }
    outputs
}
