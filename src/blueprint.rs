use std::any::type_name;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use camino::Utf8Path;
use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::TaskContext;
use crate::core::{Dynamic, Environment};
use crate::engine::{Dependencies, Diagnostics, Handle, TaskPtr, TypedTask, runner};
use crate::error::{BuildError, HankoError};

/// The blueprint for a build.
///
/// `Blueprint` is used to define the task graph. You add named tasks and wire
/// them together using their [`Handle`]s.
///
/// Once configured, you convert this into a [`Website`] to execute the build.
///
/// # Example
///
/// ```rust,no_run
/// use hanko::Blueprint;
///
/// let mut config: Blueprint<()> = Blueprint::new();
/// let a = config.task().name("a").run(|_| Ok(1));
/// config.task().name("b").depends_on(a).run(|_, a| Ok(*a + 1));
/// ```
pub struct Blueprint<G: Send + Sync = ()> {
    pub(crate) graph: Graph<TaskPtr<G>, ()>,
}

impl<G: Send + Sync + 'static> Blueprint<G> {
    /// Creates a new, empty configuration.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    pub fn finish(self) -> Website<G> {
        Website { graph: self.graph }
    }

    /// The entry point for declaring a new task.
    pub fn task(&mut self) -> TaskDef<'_, G> {
        TaskDef {
            blueprint: self,
            name: None,
        }
    }

    pub(crate) fn add_task<O, T>(&mut self, task: T) -> Handle<O>
    where
        O: 'static,
        T: TypedTask<G, Output = O> + 'static,
    {
        let dependencies = task.dependencies();
        let index = self.graph.add_node(Arc::new(task));

        for dependency in dependencies {
            self.graph.add_edge(dependency, index, ());
        }

        Handle::new(index)
    }
}

impl<G: Send + Sync + 'static> Default for Blueprint<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> std::fmt::Display for Blueprint<G>
where
    G: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_graph(f, &self.graph)
    }
}

impl<G> std::fmt::Display for Website<G>
where
    G: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_graph(f, &self.graph)
    }
}

fn write_graph<G: Send + Sync>(
    f: &mut std::fmt::Formatter<'_>,
    graph: &Graph<TaskPtr<G>, ()>,
) -> std::fmt::Result {
    writeln!(f, "graph LR")?;

    for index in graph.node_indices() {
        let task = &graph[index];
        let name = task.get_name().replace('"', "\\\"");
        writeln!(f, "    {:?}[\"{}\"]", index.index(), name)?;

        if task.is_output() {
            writeln!(f, "    {:?} --> Output", index.index())?;
        }
    }

    writeln!(f, "    Output[Output]")?;

    for edge in graph.raw_edges() {
        let type_name = graph[edge.source()]
            .get_output_type_name()
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        writeln!(
            f,
            "    {:?} -- \"{}\" --> {:?}",
            edge.source().index(),
            type_name,
            edge.target().index()
        )?;
    }

    Ok(())
}

pub struct TaskDef<'a, G: Send + Sync> {
    blueprint: &'a mut Blueprint<G>,
    name: Option<Cow<'static, str>>,
}

impl<'a, G: Send + Sync + 'static> TaskDef<'a, G> {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn depends_on<D>(self, dependencies: D) -> TaskBinder<'a, G, D>
    where
        D: Dependencies,
    {
        TaskBinder {
            blueprint: self.blueprint,
            name: self.name,
            dependencies,
        }
    }

    pub fn run<F, R>(self, callback: F) -> Handle<R>
    where
        F: Fn(&TaskContext<'_, G>) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.blueprint.add_task(TaskNode {
            name: self.name.unwrap_or(type_name::<F>().into()),
            dependencies: (),
            callback: move |ctx: &TaskContext<'_, G>, _: ()| callback(ctx),
            _phantom: PhantomData,
        })
    }
}

pub struct TaskBinder<'a, G: Send + Sync, D> {
    blueprint: &'a mut Blueprint<G>,
    name: Option<Cow<'static, str>>,
    dependencies: D,
}

impl<'a, G, D> TaskBinder<'a, G, D>
where
    G: Send + Sync + 'static,
    D: Dependencies + Send + Sync + 'static,
{
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn run<F, R>(self, callback: F) -> Handle<R>
    where
        F: for<'b> Fn(&TaskContext<'b, G>, D::Output<'b>) -> anyhow::Result<R>
            + Send
            + Sync
            + 'static,
        R: Send + Sync + 'static,
    {
        self.blueprint.add_task(TaskNode {
            name: self.name.unwrap_or(type_name::<F>().into()),
            dependencies: self.dependencies,
            callback,
            _phantom: PhantomData,
        })
    }
}

/// Represents the configured build and provides methods for running it.
///
/// A [`Website`] is created from a [`Blueprint`] and is the primary interface
/// for executing the build process.
pub struct Website<G: Send + Sync = ()> {
    pub(crate) graph: Graph<TaskPtr<G>, ()>,
}

impl<G> Website<G>
where
    G: Send + Sync + 'static,
{
    /// Names of all tasks in declaration order.
    pub fn task_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|index| self.graph[index].get_name())
            .collect()
    }

    /// Finds a task by its name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&index| self.graph[index].get_name() == name)
    }

    /// Runs the selected tasks once.
    ///
    /// This will:
    /// 1. Resolve the target names, rejecting unknown ones before anything runs.
    /// 2. Execute the targets and all of their dependencies in parallel.
    /// 3. Save the [`Output`](crate::Output)s of every successful task to `dist`.
    ///
    /// If any task failed, the returned error names every failed task and
    /// carries the [`Diagnostics`] of the run; tasks depending on a failed
    /// task never run.
    ///
    /// # Arguments
    ///
    /// * `data` - The global data to pass to all tasks.
    /// * `dist` - The directory outputs are written to.
    /// * `targets` - Task names to run, all tasks when empty.
    pub fn build<S: AsRef<str>>(
        &self,
        data: G,
        dist: impl AsRef<Utf8Path>,
        targets: &[S],
    ) -> Result<Diagnostics, HankoError> {
        runner::check_acyclic(self)?;

        let targets = targets
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.find(name).ok_or_else(|| {
                    HankoError::UnknownTask(name.to_string(), self.task_names().join(", "))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let selected = if targets.is_empty() {
            self.graph.node_indices().collect()
        } else {
            runner::select(self, &targets)
        };

        let globals = Environment::new(data);

        let report = runner::run_tasks_parallel(self, &globals, &selected).map_err(|e| {
            HankoError::Build(BuildError::Task("runner".into(), e), Box::default())
        })?;

        let outputs = runner::collect_outputs(&report.cache);
        crate::output::save_outputs(dist.as_ref(), &outputs)?;

        if !report.failures.is_empty() {
            return Err(HankoError::Build(
                BuildError::from_failures(report.failures),
                Box::new(report.diagnostics),
            ));
        }

        Ok(report.diagnostics)
    }
}

pub(crate) struct TaskNode<G, R, D, F>
where
    G: Send + Sync,
    R: Send + Sync + 'static,
    D: Dependencies,
    F: for<'a> Fn(&TaskContext<'a, G>, D::Output<'a>) -> anyhow::Result<R> + Send + Sync,
{
    pub name: Cow<'static, str>,
    pub dependencies: D,
    pub callback: F,
    pub _phantom: PhantomData<fn() -> (G, R)>,
}

impl<G, R, D, F> TypedTask<G> for TaskNode<G, R, D, F>
where
    G: Send + Sync + 'static,
    R: Send + Sync + 'static,
    D: Dependencies + Send + Sync,
    F: for<'a> Fn(&TaskContext<'a, G>, D::Output<'a>) -> anyhow::Result<R> + Send + Sync + 'static,
{
    type Output = R;

    fn get_name(&self) -> String {
        self.name.to_string()
    }

    fn dependencies(&self) -> Vec<NodeIndex> {
        self.dependencies.dependencies()
    }

    fn execute(&self, context: &TaskContext<G>, dependencies: &[Dynamic]) -> anyhow::Result<R> {
        let dependencies = self.dependencies.resolve(dependencies);
        (self.callback)(context, dependencies)
    }
}
