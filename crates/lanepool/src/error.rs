//! Error types for the dispatcher.
//!
//! Every failure is returned to the caller. The dispatcher never retries and
//! never logs on the caller's behalf; retry and shedding policy belong to the
//! producer.
//!
//! ## Error Cases
//! - `EmptyTask`: an empty task (`None`) was submitted.
//! - `Timeout`: a bounded-wait submission hit its deadline before its lane had
//!   room.
//! - `SlowConsumer`: a fail-fast submission found its lane full.
//! - `Stopped`: a submission arrived after graceful shutdown began.
//! - `InvalidConfig`: the dispatcher was configured with unusable values.
//! - `Spawn`: the OS refused to start a worker thread.

use core::time::Duration;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `lanepool` can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The submitted task was empty. Nothing was enqueued.
    #[error("task must not be empty")]
    EmptyTask,

    /// The selected lane stayed full for the whole wait.
    #[error("failed to enqueue task: timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The selected lane was full at the instant of a fail-fast submission.
    #[error("slow consumer detected on lane {lane}")]
    SlowConsumer { lane: usize },

    /// The dispatcher is shutting down or has shut down.
    #[error("dispatcher is stopped")]
    Stopped,

    /// The dispatcher configuration was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error came from a bounded wait that expired.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this error came from a fail-fast submission that
    /// found its lane full.
    pub const fn is_slow_consumer(&self) -> bool {
        matches!(self, Self::SlowConsumer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(Error::EmptyTask.to_string(), "task must not be empty");
        assert_eq!(
            Error::SlowConsumer { lane: 3 }.to_string(),
            "slow consumer detected on lane 3"
        );
        assert_eq!(
            Error::Timeout {
                timeout: Duration::from_millis(5)
            }
            .to_string(),
            "failed to enqueue task: timed out after 5ms"
        );
    }

    #[test]
    fn predicates_match_only_their_variant() {
        let timeout = Error::Timeout {
            timeout: Duration::ZERO,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_slow_consumer());

        let slow = Error::SlowConsumer { lane: 0 };
        assert!(slow.is_slow_consumer());
        assert!(!slow.is_timeout());

        assert!(!Error::Stopped.is_timeout());
        assert!(!Error::EmptyTask.is_slow_consumer());
    }
}
