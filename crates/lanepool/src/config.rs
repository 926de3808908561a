use crate::{Error, Result};

/// Construction parameters for a [`Dispatcher`](crate::Dispatcher).
///
/// All values are fixed for the lifetime of the dispatcher; the lane count is
/// never resized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of lanes, each drained by one dedicated worker thread. Must be
    /// greater than 0.
    pub lanes: usize,

    /// Buffer capacity of every lane.
    ///
    /// A capacity of 0 turns each lane into a rendezvous hand-off: a
    /// submission only succeeds while the lane's worker is blocked waiting for
    /// work, so [`Dispatcher::serve_right_away`](crate::Dispatcher::serve_right_away)
    /// fails whenever the worker is busy.
    pub lane_capacity: usize,

    /// Catch panics raised by individual tasks so the lane keeps running.
    ///
    /// When disabled, a panicking task unwinds through the worker and the
    /// lane loses its worker permanently; tasks still buffered on it are
    /// reported as lost at shutdown.
    pub isolate_panics: bool,

    /// Prefix for worker thread names. Lane `i` runs on `"{thread_name}-{i}"`.
    pub thread_name: String,
}

impl DispatcherConfig {
    /// Lane capacity used by [`DispatcherConfig::default`].
    pub const DEFAULT_LANE_CAPACITY: usize = 128;

    /// Thread name prefix used by [`DispatcherConfig::default`].
    pub const DEFAULT_THREAD_NAME: &'static str = "lanepool-worker";

    /// Creates a configuration with the given shape and default settings for
    /// everything else.
    pub fn new(lanes: usize, lane_capacity: usize) -> Self {
        Self {
            lanes,
            lane_capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_isolate_panics(mut self, isolate_panics: bool) -> Self {
        self.isolate_panics = isolate_panics;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Checks that the configuration can be used to build a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `lanes` is 0 or `thread_name`
    /// contains a NUL byte (thread names are passed to the OS as C strings).
    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 {
            return Err(Error::InvalidConfig {
                reason: "lanes must be greater than 0".into(),
            });
        }

        if self.thread_name.contains('\0') {
            return Err(Error::InvalidConfig {
                reason: "thread_name must not contain NUL bytes".into(),
            });
        }

        Ok(())
    }
}

impl Default for DispatcherConfig {
    /// One lane per logical CPU, 128 slots per lane, panics isolated.
    fn default() -> Self {
        Self {
            lanes: num_cpus::get().max(1),
            lane_capacity: Self::DEFAULT_LANE_CAPACITY,
            isolate_panics: true,
            thread_name: Self::DEFAULT_THREAD_NAME.into(),
        }
    }
}
