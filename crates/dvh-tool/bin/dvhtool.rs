//! `dvhtool` binary entry point.
//!
//! This is a thin wrapper around the dvh-tool library that:
//! 1. Initializes logging (stderr, `RUST_LOG`, default `warn`)
//! 2. Parses command-line arguments
//! 3. Runs the selected action against the device
//!
//! Listings go to stdout; diagnostics go to stderr.

use std::io::{self, Write};

use anyhow::Result;
use dvh_tool::{Cli, run};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::from_args();
    tracing::debug!(device = %cli.device.display(), action = ?cli.action(), "starting");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)?;
    out.flush()?;

    Ok(())
}
