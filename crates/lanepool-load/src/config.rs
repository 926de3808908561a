use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use lanepool::DispatcherConfig;

/// Which submission contract producers use.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Block until the lane has room.
    Serve,
    /// Block up to `TIMEOUT_MS`, then give up.
    Timeout,
    /// Fail immediately if the lane is full.
    RightAway,
}

/// Runtime configuration for the `lanepool-load` binary.
///
/// All values are parsed from CLI arguments or environment variables. The
/// defaults produce a short run that overloads a small dispatcher, so every
/// mode shows some backpressure.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lanepool-load",
    version,
    about = "Drive a lanepool dispatcher under load and report shutdown accounting"
)]
pub struct CliArgs {
    /// Number of worker lanes.
    ///
    /// Environment variable: `LANES`
    #[arg(long, env = "LANES", default_value_t = 4)]
    pub lanes: usize,

    /// Buffer capacity of each lane. 0 makes every lane a rendezvous hand-off.
    ///
    /// Environment variable: `LANE_CAPACITY`
    #[arg(long, env = "LANE_CAPACITY", default_value_t = 64)]
    pub lane_capacity: usize,

    /// Number of producer threads submitting concurrently.
    ///
    /// Environment variable: `PRODUCERS`
    #[arg(long, env = "PRODUCERS", default_value_t = 8)]
    pub producers: usize,

    /// Tasks each producer submits.
    ///
    /// Environment variable: `TASKS_PER_PRODUCER`
    #[arg(long, env = "TASKS_PER_PRODUCER", default_value_t = 10_000)]
    pub tasks_per_producer: usize,

    /// Submission mode.
    ///
    /// Environment variable: `MODE`
    #[arg(long, env = "MODE", value_enum, default_value_t = Mode::Serve)]
    pub mode: Mode,

    /// Deadline for `timeout` mode, in milliseconds.
    ///
    /// Environment variable: `TIMEOUT_MS`
    #[arg(long, env = "TIMEOUT_MS", default_value_t = 5)]
    pub timeout_ms: u64,

    /// Simulated work per task, in microseconds (busy wait).
    ///
    /// Environment variable: `TASK_MICROS`
    #[arg(long, env = "TASK_MICROS", default_value_t = 20)]
    pub task_micros: u64,

    /// Make every Nth task panic (0 disables injected panics).
    ///
    /// Environment variable: `PANIC_EVERY`
    #[arg(long, env = "PANIC_EVERY", default_value_t = 0)]
    pub panic_every: usize,

    /// Let task panics terminate their lane instead of isolating them.
    #[arg(long, default_value_t = false)]
    pub no_isolate_panics: bool,
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub dispatcher: DispatcherConfig,
    pub producers: usize,
    pub tasks_per_producer: usize,
    pub mode: Mode,
    pub timeout: Duration,
    pub task_work: Duration,
    pub panic_every: usize,
}

impl LoadConfig {
    /// Total number of submissions the run will attempt.
    pub const fn total_tasks(&self) -> usize {
        self.producers * self.tasks_per_producer
    }
}

impl TryFrom<CliArgs> for LoadConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.producers == 0 {
            bail!("PRODUCERS must be greater than 0");
        }

        if args.producers.checked_mul(args.tasks_per_producer).is_none() {
            bail!(
                "PRODUCERS ({}) * TASKS_PER_PRODUCER ({}) overflows",
                args.producers,
                args.tasks_per_producer
            );
        }

        // A dead lane never drains, so a blocking producer aimed at it would
        // wait forever.
        if args.no_isolate_panics && args.panic_every > 0 && args.mode == Mode::Serve {
            bail!("MODE=serve cannot be combined with PANIC_EVERY and --no-isolate-panics");
        }

        let dispatcher = DispatcherConfig::new(args.lanes, args.lane_capacity)
            .with_isolate_panics(!args.no_isolate_panics)
            .with_thread_name("lane");
        dispatcher.validate()?;

        Ok(Self {
            dispatcher,
            producers: args.producers,
            tasks_per_producer: args.tasks_per_producer,
            mode: args.mode,
            timeout: Duration::from_millis(args.timeout_ms),
            task_work: Duration::from_micros(args.task_micros),
            panic_every: args.panic_every,
        })
    }
}
