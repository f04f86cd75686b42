//! ppoi-planner entry point: logging setup and command dispatch.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ppoi_planner::cli::{Cli, run};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
