use petgraph::graph::NodeIndex;

use crate::core::Dynamic;

/// A type-safe reference to a task in the build graph.
///
/// A `Handle<T>` is a lightweight, copyable token that represents a future
/// result of type `T`. It is used to define dependencies between tasks. When
/// one task depends on another, it holds a handle to that dependency. The
/// runner ensures that the dependency finishes before the task that depends
/// on it starts.
///
/// # Diamond Dependencies
///
/// If Task C and Task B both depend on Task A, and Task D depends on both B
/// and C, Task A will only be executed *once*, and its result will be shared.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle<T> {
    pub(crate) index: NodeIndex,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: NodeIndex) -> Self {
        Self {
            index,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the underlying `NodeIndex` of the task in the graph.
    pub fn index(&self) -> NodeIndex {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Handle<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn downcast<'a>(&self, output: &'a Dynamic) -> &'a T {
        output
            .downcast_ref::<T>()
            .expect("Type mismatch in dependency resolution")
    }
}
