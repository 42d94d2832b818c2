//! All the generic task graph related abstractions.
//!
//! A task is a unit of work that produces a result. Tasks are organized into
//! a Directed Acyclic Graph (DAG), where dependencies are explicitly declared
//! through [`Handle`]s.
//!
//! Under the hood, the graph is entirely type-erased. It stores all outputs
//! as `Arc<dyn Any + Send + Sync>`. A `Handle<T>` carries no data but holds
//! the type `T` in `PhantomData`, which lets the compiler enforce that a task
//! receives exactly the type its dependency produces. The [`Dependencies`]
//! trait performs the `downcast_ref` when the task runs.

mod handle;
pub(crate) mod runner;
mod task;

use std::sync::Arc;

use petgraph::graph::NodeIndex;

pub use crate::engine::handle::Handle;
pub use crate::engine::runner::{Diagnostics, TaskExecution, TaskState};
pub(crate) use crate::engine::task::{Task, TypedTask};

use crate::core::Dynamic;

pub(crate) type TaskPtr<G> = Arc<dyn Task<G>>;

/// A trait that enables a collection of [`Handle<T>`]s to be used as
/// dependencies for a task.
///
/// This trait is implemented for single handles, vectors of handles and
/// tuples of handles, allowing them to be passed to
/// [`TaskDef::depends_on`](crate::blueprint::TaskDef::depends_on).
pub trait Dependencies {
    /// The resulting type when all dependencies are resolved.
    /// For a tuple of [`Handle<T>`]s, this will be a tuple of `&'a T`s.
    type Output<'a>;

    /// Returns the [`NodeIndex`] for each dependency in the collection.
    fn dependencies(&self) -> Vec<NodeIndex>;

    /// Takes a slice of type-erased dependency outputs and resolves them into a
    /// concrete `Output` type.
    ///
    /// # Panics
    /// This method will panic if the type-erased outputs cannot be downcast to
    /// their expected concrete types, indicating a severe logic error in the
    /// build system.
    fn resolve<'a>(&self, outputs: &'a [Dynamic]) -> Self::Output<'a>;
}

impl Dependencies for () {
    type Output<'a> = ();

    fn dependencies(&self) -> Vec<NodeIndex> {
        vec![]
    }

    fn resolve<'a>(&self, _: &'a [Dynamic]) -> Self::Output<'a> {}
}

impl<T> Dependencies for Handle<T>
where
    T: Send + Sync + 'static,
{
    type Output<'a> = &'a T;

    fn dependencies(&self) -> Vec<NodeIndex> {
        vec![self.index()]
    }

    fn resolve<'a>(&self, outputs: &'a [Dynamic]) -> Self::Output<'a> {
        self.downcast(&outputs[0])
    }
}

impl<T> Dependencies for Vec<Handle<T>>
where
    T: Send + Sync + 'static,
{
    type Output<'a> = Vec<&'a T>;

    fn dependencies(&self) -> Vec<NodeIndex> {
        self.iter().map(Handle::index).collect()
    }

    fn resolve<'a>(&self, outputs: &'a [Dynamic]) -> Self::Output<'a> {
        self.iter()
            .zip(outputs)
            .map(|(handle, output)| handle.downcast(output))
            .collect()
    }
}

macro_rules! impl_deps {
    ($($D:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($D),*> Dependencies for ($(Handle<$D>,)*)
        where
            $($D: Send + Sync + 'static),* {
            type Output<'a> = ($(&'a $D,)*);

            fn dependencies(&self) -> Vec<NodeIndex> {
                let ($($D,)*) = self;
                vec![$($D.index(),)*]
            }

            fn resolve<'a>(&self, outputs: &'a [Dynamic]) -> Self::Output<'a> {
                let ($($D,)*) = self;
                let mut iter = outputs.iter();

                ($({
                    let out = iter.next().expect("Missing dependency output");
                    $D.downcast(out)
                },)*)
            }
        }
    };
}

impl_deps!(A);
impl_deps!(A, B);
impl_deps!(A, B, C);
impl_deps!(A, B, C, D);
impl_deps!(A, B, C, D, E);
impl_deps!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tuple() {
        let a: Handle<u32> = Handle::new(NodeIndex::new(0));
        let b: Handle<String> = Handle::new(NodeIndex::new(3));
        let deps = (a, b);

        assert_eq!(
            deps.dependencies(),
            vec![NodeIndex::new(0), NodeIndex::new(3)]
        );

        let outputs: Vec<Dynamic> = vec![Arc::new(7u32), Arc::new(String::from("seven"))];
        let (num, text) = deps.resolve(&outputs);
        assert_eq!(*num, 7);
        assert_eq!(text, "seven");
    }

    #[test]
    fn test_resolve_vec() {
        let handles: Vec<Handle<u8>> = (0..3).map(|i| Handle::new(NodeIndex::new(i))).collect();
        let outputs: Vec<Dynamic> = vec![Arc::new(1u8), Arc::new(2u8), Arc::new(3u8)];

        assert_eq!(handles.resolve(&outputs), vec![&1, &2, &3]);
    }

    #[test]
    #[should_panic(expected = "Type mismatch")]
    fn test_resolve_wrong_type() {
        let handle: Handle<u32> = Handle::new(NodeIndex::new(0));
        let outputs: Vec<Dynamic> = vec![Arc::new("not a number")];
        handle.resolve(&outputs);
    }
}
