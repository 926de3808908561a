//! Log output for the load driver.
//!
//! Events are printed to stderr through `tracing_subscriber::fmt`, filtered by
//! `RUST_LOG` (default `info`). The `lanepool` crate is built with its
//! `tracing` feature here, so worker lifecycle, isolated panics and shutdown
//! accounting show up alongside the driver's own events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
