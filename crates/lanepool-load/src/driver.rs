use crate::config::{LoadConfig, Mode};
use anyhow::Context;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use lanepool::{Dispatcher, DispatcherStats, ShutdownReport, Task};
use std::thread::scope;
use std::time::Instant;

/// What a load run did, end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Submissions the dispatcher accepted.
    pub accepted: u64,
    /// Submissions refused with a timeout or slow-consumer error.
    pub rejected: u64,
    /// Counters read after every worker exited.
    pub stats: DispatcherStats,
    /// Graceful-shutdown accounting.
    pub report: ShutdownReport,
    /// Wall time from the first submission to the end of shutdown.
    pub elapsed: Duration,
}

/// Floods a fresh dispatcher from `config.producers` threads, then stops it
/// gracefully.
///
/// # Errors
///
/// Returns an error if the dispatcher cannot be started, or if a submission
/// fails for any reason other than backpressure.
pub fn run(config: &LoadConfig) -> anyhow::Result<LoadOutcome> {
    let dispatcher =
        Dispatcher::with_config(config.dispatcher.clone()).context("failed to start dispatcher")?;

    tracing::info!(
        "Submitting {} tasks from {} producers in {:?} mode",
        config.total_tasks(),
        config.producers,
        config.mode
    );

    let accepted = AtomicU64::new(0);
    let rejected = AtomicU64::new(0);
    let started = Instant::now();

    scope(|s| -> anyhow::Result<()> {
        let producers: Vec<_> = (0..config.producers)
            .map(|producer| {
                let dispatcher = &dispatcher;
                let accepted = &accepted;
                let rejected = &rejected;
                s.spawn(move || produce(producer, dispatcher, config, accepted, rejected))
            })
            .collect();

        for producer in producers {
            match producer.join() {
                Ok(result) => result?,
                Err(_) => anyhow::bail!("producer thread panicked"),
            }
        }
        Ok(())
    })?;

    let report = dispatcher.graceful_stop();
    let elapsed = started.elapsed();

    Ok(LoadOutcome {
        accepted: accepted.into_inner(),
        rejected: rejected.into_inner(),
        stats: dispatcher.stats(),
        report,
        elapsed,
    })
}

fn produce(
    producer: usize,
    dispatcher: &Dispatcher,
    config: &LoadConfig,
    accepted: &AtomicU64,
    rejected: &AtomicU64,
) -> anyhow::Result<()> {
    let _span = tracing::debug_span!("producer", id = producer).entered();

    for n in 0..config.tasks_per_producer {
        let should_panic = config.panic_every > 0
            && (producer * config.tasks_per_producer + n + 1) % config.panic_every == 0;
        let task = simulated_task(config.task_work, should_panic);

        let result = match config.mode {
            Mode::Serve => dispatcher.serve(task),
            Mode::Timeout => dispatcher.serve_with_timeout(task, config.timeout),
            Mode::RightAway => dispatcher.serve_right_away(task),
        };

        match result {
            Ok(()) => {
                accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_timeout() || e.is_slow_consumer() => {
                rejected.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("producer {producer} failed at task {n}"));
            }
        }
    }

    tracing::debug!("Producer {producer} finished");
    Ok(())
}

fn simulated_task(work: Duration, should_panic: bool) -> Task {
    Task::new(move || {
        let start = Instant::now();
        while start.elapsed() < work {
            core::hint::spin_loop();
        }
        assert!(!should_panic, "injected task failure");
    })
}
