//! Warpdrop CLI - peer-to-peer file and text drops
//!
//! Warpdrop moves files and short text messages between two peers
//! that rendezvous on a human-friendly share code like `Cosmic-Falcon`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run a loopback transfer to see the pipeline end to end
//! warpdrop demo ./document.pdf
//!
//! # Review past transfers
//! warpdrop history
//! ```

#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo(args) => commands::demo::run(args).await,
        Command::SendText(args) => commands::demo::run_text(args).await,
        Command::History(args) => commands::history::run(&args),
        Command::Config(args) => commands::config::run(&args),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,warpdrop=info,warpdrop_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
