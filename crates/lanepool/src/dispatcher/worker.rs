use super::lane::Envelope;
use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_channel::Receiver;
use std::panic::{self, AssertUnwindSafe};

/// Counters shared by every worker of one dispatcher.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self, pending: usize) -> DispatcherStats {
        DispatcherStats {
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Point-in-time view of a dispatcher's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Tasks that ran to completion.
    pub executed: u64,
    /// Tasks that panicked, whether or not the panic was isolated.
    pub panicked: u64,
    /// Entries sitting in lane buffers when the snapshot was taken.
    pub pending: usize,
}

/// Worker loop bound to a single lane.
///
/// Blocks on the lane's receiver and runs each task synchronously, in the
/// order it was enqueued, until the poison marker is dequeued or every sender
/// is gone. Entries queued behind the poison marker are left untouched.
///
/// There is no per-task timeout: a task that never returns stalls its lane.
///
/// # Arguments
///
/// - `_lane`: Index of the lane this worker drains (used for logs/tracing).
/// - `rx`: Receiver end of the lane buffer.
/// - `counters`: Shared execution counters.
/// - `isolate_panics`: Catch task panics and keep the lane alive. When
///   `false` the panic is counted and then resumed, terminating this worker.
#[allow(clippy::used_underscore_binding)]
pub(crate) fn worker_loop(
    _lane: usize,
    rx: Receiver<Envelope>,
    counters: &Counters,
    isolate_panics: bool,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Lane {_lane} worker started");

    while let Ok(envelope) = rx.recv() {
        match envelope {
            Envelope::Run(task) => match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
                Ok(()) => {
                    counters.executed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    if !isolate_panics {
                        #[cfg(feature = "tracing")]
                        tracing::error!("Lane {_lane} worker terminated by panicking task");
                        panic::resume_unwind(payload);
                    }

                    #[cfg(feature = "tracing")]
                    tracing::warn!("Lane {_lane} task panicked: {}", panic_message(&*payload));
                }
            },
            Envelope::Poison => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Lane {_lane} worker received shutdown signal");
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Lane {_lane} worker stopped");
}

#[cfg(feature = "tracing")]
fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
