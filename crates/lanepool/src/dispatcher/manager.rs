//! Round-robin dispatcher over a fixed set of worker lanes.
//!
//! This module defines [`Dispatcher`], which owns `N` lanes, each a bounded
//! FIFO buffer drained by one dedicated worker thread. Producers on any number
//! of threads submit fire-and-forget tasks; each submission picks a lane by
//! round-robin and then either blocks, blocks with a deadline, or fails fast
//! depending on the operation called.
//!
//! There is no global lock on the submission path: lane selection is a single
//! atomic increment and each lane is an MPSC channel, so contention is sharded
//! across lanes.

use super::{
    lane::{Envelope, Lane},
    worker::{Counters, DispatcherStats, worker_loop},
};
use crate::{DispatcherConfig, Error, IntoTask, Result, Task, TimerPool};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use crossbeam_channel::{SendTimeoutError, TrySendError};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Counts returned by [`Dispatcher::graceful_stop`].
///
/// Both values are best-effort when producers keep submitting while shutdown
/// runs: the two scans are not atomic with respect to the poison pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Entries buffered across all lanes when shutdown began.
    pub pending: usize,
    /// Tasks still buffered after every worker exited. They never ran and
    /// have been dropped.
    pub lost: usize,
}

/// A fixed pool of worker lanes fed by producer threads.
///
/// Work is distributed round-robin. Within a lane tasks run in submission
/// order; across lanes there is no ordering.
///
/// # Submission
///
/// | Operation | When the lane is full |
/// |---|---|
/// | [`serve`](Self::serve) | waits for room |
/// | [`serve_with_timeout`](Self::serve_with_timeout) | waits up to a deadline, then [`Error::Timeout`] |
/// | [`serve_right_away`](Self::serve_right_away) | [`Error::SlowConsumer`] immediately |
///
/// # Shutdown
///
/// [`graceful_stop`](Self::graceful_stop) drains everything queued before it
/// and joins every worker. Dropping a dispatcher that was never stopped runs
/// the same graceful stop, so drop blocks until every lane has drained.
///
/// # Example
/// ```
/// use lanepool::Dispatcher;
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::new(2, 16)?;
/// dispatcher.serve(|| println!("blocking submit"))?;
/// dispatcher.serve_with_timeout(|| println!("bounded submit"), Duration::from_millis(5))?;
/// dispatcher.serve_right_away(|| println!("fail-fast submit"))?;
///
/// let report = dispatcher.graceful_stop();
/// assert_eq!(report.lost, 0);
/// # Ok::<(), lanepool::Error>(())
/// ```
#[derive(Debug)]
pub struct Dispatcher {
    lanes: Box<[Lane]>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_lane: CachePadded<AtomicUsize>,
    stopped: AtomicBool,
    timers: Arc<TimerPool>,
    pub(super) counters: Arc<Counters>,
    lane_capacity: usize,
}

impl Dispatcher {
    /// Starts `lanes` workers, each draining a buffer of `lane_capacity`
    /// slots. Everything else uses [`DispatcherConfig::default`] settings.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `lanes` is 0.
    /// - [`Error::Spawn`] if a worker thread cannot be started.
    pub fn new(lanes: usize, lane_capacity: usize) -> Result<Self> {
        Self::with_config(DispatcherConfig::new(lanes, lane_capacity))
    }

    /// Starts a dispatcher from `config`, using the process-wide
    /// [`TimerPool::global`] for bounded waits.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::new`].
    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        Self::with_timer_pool(config, TimerPool::global())
    }

    /// Starts a dispatcher from `config` that leases its timers from `timers`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::new`]. If spawning fails part way, the workers that
    /// did start are shut down before the error is returned.
    pub fn with_timer_pool(config: DispatcherConfig, timers: Arc<TimerPool>) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(Counters::default());
        let mut lanes = Vec::with_capacity(config.lanes);
        let mut workers = Vec::with_capacity(config.lanes);

        for index in 0..config.lanes {
            let lane = Lane::new(config.lane_capacity);
            let rx = lane.receiver();
            let worker_counters = Arc::clone(&counters);
            let isolate_panics = config.isolate_panics;

            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || worker_loop(index, rx, &worker_counters, isolate_panics));

            match spawned {
                Ok(handle) => {
                    lanes.push(lane);
                    workers.push(handle);
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to spawn worker for lane {index}: {e}");

                    // Dropping the senders disconnects the lanes; started
                    // workers see that and exit.
                    drop(lanes);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::Spawn(e));
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Dispatcher started with {} lanes of capacity {}",
            config.lanes,
            config.lane_capacity
        );

        Ok(Self {
            lanes: lanes.into_boxed_slice(),
            workers: Mutex::new(workers),
            next_lane: CachePadded::new(AtomicUsize::new(0)),
            stopped: AtomicBool::new(false),
            timers,
            counters,
            lane_capacity: config.lane_capacity,
        })
    }

    /// Number of lanes (and worker threads).
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Buffer capacity of each lane.
    pub const fn lane_capacity(&self) -> usize {
        self.lane_capacity
    }

    /// Entries currently buffered across all lanes.
    pub fn pending(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }

    /// Execution counters plus the current [`pending`](Self::pending) count.
    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot(self.pending())
    }

    /// Returns `true` once [`graceful_stop`](Self::graceful_stop) has begun.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns the index of the lane to receive the next submission.
    ///
    /// Increments the shared counter, then reduces it modulo the lane count,
    /// so the first submission lands on lane 1 (or lane 0 with a single
    /// lane). Uses a relaxed atomic increment to minimize contention.
    pub fn next_lane_index(&self) -> usize {
        let next = self.next_lane.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        next % self.lanes.len()
    }

    /// Enqueues `task`, waiting as long as it takes for the selected lane to
    /// have room.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTask`] if `task` is empty; nothing is enqueued.
    /// - [`Error::Stopped`] if shutdown has begun.
    pub fn serve<T: IntoTask>(&self, task: T) -> Result<()> {
        let task = self.accept(task)?;
        let lane = &self.lanes[self.next_lane_index()];

        lane.tx
            .send(Envelope::Run(task))
            .map_err(|_| Error::Stopped)
    }

    /// Enqueues `task`, waiting at most `timeout` for the selected lane to
    /// have room.
    ///
    /// If the lane has room right away the task is enqueued without touching
    /// the timer pool. Otherwise a timer is leased from the pool for the wait
    /// and returned afterwards, whatever the outcome. Only the wait is
    /// cancelled on timeout; once enqueued a task always runs.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTask`] if `task` is empty; nothing is enqueued.
    /// - [`Error::Timeout`] if the lane stayed full for `timeout`.
    /// - [`Error::Stopped`] if shutdown has begun.
    pub fn serve_with_timeout<T: IntoTask>(&self, task: T, timeout: Duration) -> Result<()> {
        let task = self.accept(task)?;
        let lane = &self.lanes[self.next_lane_index()];

        let envelope = match lane.tx.try_send(Envelope::Run(task)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(envelope)) => envelope,
            Err(TrySendError::Disconnected(_)) => return Err(Error::Stopped),
        };

        let mut timer = self.timers.lease(timeout);
        timer
            .send_before(&lane.tx, envelope)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => Error::Timeout { timeout },
                SendTimeoutError::Disconnected(_) => Error::Stopped,
            })
    }

    /// Enqueues `task` only if the selected lane has room at this instant.
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTask`] if `task` is empty; nothing is enqueued.
    /// - [`Error::SlowConsumer`] if the lane was full.
    /// - [`Error::Stopped`] if shutdown has begun.
    pub fn serve_right_away<T: IntoTask>(&self, task: T) -> Result<()> {
        let task = self.accept(task)?;
        let index = self.next_lane_index();

        match self.lanes[index].tx.try_send(Envelope::Run(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::SlowConsumer { lane: index }),
            Err(TrySendError::Disconnected(_)) => Err(Error::Stopped),
        }
    }

    /// Stops every lane after it drains, then reports what was pending and
    /// what was lost.
    ///
    /// - Refuses new submissions with [`Error::Stopped`]. Producers already
    ///   blocked inside [`serve`](Self::serve) are not interrupted.
    /// - Counts entries buffered across all lanes (`pending`).
    /// - Appends one poison marker to every lane. This may block while a lane
    ///   is full; it competes for space with blocked producers, and both make
    ///   progress as the lane drains. A lane whose worker already died is
    ///   skipped.
    /// - Joins every worker thread.
    /// - Drops and counts tasks left behind the poison markers (`lost`).
    ///
    /// Everything queued on a lane before its poison marker runs before the
    /// worker exits. Only a call that starts shutdown does any work; later
    /// calls return an empty report immediately.
    #[allow(clippy::used_underscore_binding)]
    pub fn graceful_stop(&self) -> ShutdownReport {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }

        let pending = self.pending();

        #[cfg(feature = "tracing")]
        tracing::info!("Stopping dispatcher ({pending} tasks pending)");

        let workers = core::mem::take(&mut *self.workers.lock());

        for (_index, (lane, worker)) in self.lanes.iter().zip(&workers).enumerate() {
            if !lane.poison(worker) {
                #[cfg(feature = "tracing")]
                tracing::warn!("Lane {_index} worker exited before shutdown signal");
            }
        }

        for (_index, handle) in workers.into_iter().enumerate() {
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!("Lane {_index} worker was terminated by a panicking task");
            }
        }

        let lost = self.lanes.iter().map(Lane::discard).sum();

        #[cfg(feature = "tracing")]
        tracing::info!("Dispatcher stopped ({pending} pending, {lost} lost)");

        ShutdownReport { pending, lost }
    }

    fn accept<T: IntoTask>(&self, task: T) -> Result<Task> {
        let task = task.into_task().ok_or(Error::EmptyTask)?;
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        Ok(task)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.graceful_stop();
    }
}
