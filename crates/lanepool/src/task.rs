use core::fmt;

/// A boxed, fire-and-forget unit of work.
///
/// Tasks take no arguments and return nothing. Once accepted by a lane a task
/// runs exactly once on that lane's worker thread, or is counted as lost by
/// [`Dispatcher::graceful_stop`](crate::Dispatcher::graceful_stop).
pub struct Task(Box<dyn FnOnce() + Send + 'static>);

impl Task {
    /// Boxes a closure into a [`Task`].
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Conversion into an optional [`Task`] at the submission boundary.
///
/// Closures and [`Task`]s always convert to `Some`. An `Option<Task>` passes
/// through unchanged, so a `None` reaches the dispatcher and is rejected with
/// [`Error::EmptyTask`](crate::Error::EmptyTask) instead of being enqueued.
pub trait IntoTask {
    /// Converts `self` into a task, or `None` when there is nothing to run.
    fn into_task(self) -> Option<Task>;
}

impl<F> IntoTask for F
where
    F: FnOnce() + Send + 'static,
{
    fn into_task(self) -> Option<Task> {
        Some(Task::new(self))
    }
}

impl IntoTask for Task {
    fn into_task(self) -> Option<Task> {
        Some(self)
    }
}

impl IntoTask for Option<Task> {
    fn into_task(self) -> Option<Task> {
        self
    }
}
