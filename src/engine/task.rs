use std::sync::Arc;

use petgraph::graph::NodeIndex;

use crate::TaskContext;
use crate::core::Dynamic;

pub(crate) trait TypedTask<G: Send + Sync = ()>: Send + Sync {
    /// The concrete output type of this task.
    type Output: Send + Sync + 'static;

    fn get_name(&self) -> String;

    fn dependencies(&self) -> Vec<NodeIndex>;

    fn execute(
        &self,
        context: &TaskContext<G>,
        dependencies: &[Dynamic],
    ) -> anyhow::Result<Self::Output>;
}

/// The core trait for all tasks in the graph.
///
/// While most users will interact with the typed [`Blueprint::task`](crate::Blueprint::task)
/// API, this trait is the type-erased foundation that allows the graph to hold
/// tasks with different output types.
pub(crate) trait Task<G: Send + Sync = ()>: Send + Sync {
    fn get_name(&self) -> String;

    fn get_output_type_name(&self) -> &'static str;

    fn is_output(&self) -> bool;

    fn dependencies(&self) -> Vec<NodeIndex>;

    fn execute(&self, context: &TaskContext<G>, dependencies: &[Dynamic])
    -> anyhow::Result<Dynamic>;
}

// A blanket implementation to automatically bridge the two. This is where the
// type erasure actually happens.
impl<G, T> Task<G> for T
where
    G: Send + Sync,
    T: TypedTask<G> + 'static,
{
    fn get_name(&self) -> String {
        T::get_name(self)
    }

    fn get_output_type_name(&self) -> &'static str {
        std::any::type_name::<T::Output>()
    }

    fn is_output(&self) -> bool {
        use std::any::TypeId;

        TypeId::of::<T::Output>() == TypeId::of::<crate::Output>()
            || TypeId::of::<T::Output>() == TypeId::of::<Vec<crate::Output>>()
    }

    fn dependencies(&self) -> Vec<NodeIndex> {
        T::dependencies(self)
    }

    fn execute(
        &self,
        context: &TaskContext<G>,
        dependencies: &[Dynamic],
    ) -> anyhow::Result<Dynamic> {
        // Call the typed method, then erase the result.
        let output = T::execute(self, context, dependencies)?;
        Ok(Arc::new(output))
    }
}
