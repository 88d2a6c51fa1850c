use clap::Parser;
use std::io;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

mod corner;
mod frames;
mod prog_opts;
mod util;

use crate::prog_opts::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // set up the logging. The level is taken from RUST_LOG if it
    // is set, otherwise from --quiet / --verbose, defaulting to INFO.
    let default_level = if args.quiet {
        LevelFilter::WARN
    } else if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    frames::run(&args)
}
