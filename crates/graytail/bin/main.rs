use clap::Parser;
use colored::Colorize;
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

mod cmd;

use cmd::search::SearchArgs;

const LOG_ENV: &str = "GRAYTAIL_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    // interrupts end the process right away, nothing needs cleaning up
    if let Err(e) = ctrlc::set_handler(|| std::process::exit(130)) {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }

    let args = SearchArgs::parse();
    if let Err(e) = args.run() {
        if cmd::search::is_broken_pipe(&e) {
            return;
        }
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
