//! Load driver for the `lanepool` dispatcher.
//!
//! Starts a dispatcher, floods it from a configurable number of producer
//! threads using one of the three submission modes, stops it gracefully, and
//! logs the resulting accounting. See the crate README for the full list of
//! environment variables.

use crate::{
    config::{CliArgs, LoadConfig},
    telemetry::init_telemetry,
};
use clap::Parser;
use mimalloc::MiMalloc;

mod config;
mod driver;
mod telemetry;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = LoadConfig::try_from(args)?;

    init_telemetry()?;

    tracing::info!(
        "Starting load run: {} lanes x {} slots, {} producers x {} tasks, mode {:?}",
        config.dispatcher.lanes,
        config.dispatcher.lane_capacity,
        config.producers,
        config.tasks_per_producer,
        config.mode
    );

    let outcome = driver::run(&config)?;

    let secs = outcome.elapsed.as_secs_f64();
    #[allow(clippy::cast_precision_loss)]
    let throughput = if secs > 0.0 {
        outcome.accepted as f64 / secs
    } else {
        0.0
    };

    tracing::info!(
        "Accepted {} / rejected {} in {:?} ({throughput:.0} tasks/s)",
        outcome.accepted,
        outcome.rejected,
        outcome.elapsed
    );
    tracing::info!(
        "Executed {} / panicked {} / pending at stop {} / lost {}",
        outcome.stats.executed,
        outcome.stats.panicked,
        outcome.report.pending,
        outcome.report.lost
    );

    Ok(())
}
