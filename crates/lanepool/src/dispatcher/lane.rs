use crate::Task;
use core::time::Duration;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::thread::JoinHandle;

/// How long a poison push waits on a full lane before checking whether the
/// lane's worker is still alive.
const POISON_RETRY: Duration = Duration::from_millis(10);

/// An entry in a lane buffer.
///
/// The terminal marker is its own variant, so an empty task can never be
/// mistaken for it.
#[derive(Debug)]
pub(crate) enum Envelope {
    /// A task to run.
    Run(Task),
    /// Exit the worker loop. Entries queued behind it are never run.
    Poison,
}

/// One bounded FIFO buffer feeding a single worker thread.
///
/// The lane keeps its own receiver handle next to the one owned by the worker.
/// This keeps the channel connected after the worker has exited, so entries
/// stranded behind the poison marker can still be counted.
#[derive(Debug)]
pub(crate) struct Lane {
    pub(crate) tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Lane {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// A receiver for the lane's worker.
    pub(crate) fn receiver(&self) -> Receiver<Envelope> {
        self.rx.clone()
    }

    /// Number of entries currently buffered.
    pub(crate) fn len(&self) -> usize {
        self.tx.len()
    }

    /// Appends the poison marker behind everything already queued.
    ///
    /// Blocks while the lane is full, competing with producers for space.
    /// Gives up and returns `false` if `worker` exits before the marker is
    /// accepted, since nothing would ever drain it.
    pub(crate) fn poison(&self, worker: &JoinHandle<()>) -> bool {
        let mut envelope = Envelope::Poison;
        loop {
            match self.tx.send_timeout(envelope, POISON_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) if !worker.is_finished() => {
                    envelope = returned;
                }
                Err(_) => return false,
            }
        }
    }

    /// Drains and drops everything left in the buffer, returning how many
    /// tasks were discarded. Only meaningful once the worker has exited.
    pub(crate) fn discard(&self) -> usize {
        self.rx
            .try_iter()
            .filter(|envelope| matches!(envelope, Envelope::Run(_)))
            .count()
    }
}
