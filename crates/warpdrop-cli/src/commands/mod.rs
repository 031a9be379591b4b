//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, commands
/// fall back to defaults rather than refusing to run.
pub fn load_config() -> warpdrop_core::config::Config {
    warpdrop_core::config::Config::load().unwrap_or_default()
}

pub mod config;
pub mod demo;
pub mod history;

/// Warpdrop - peer-to-peer file and text drops
#[derive(Parser)]
#[command(name = "warpdrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run a loopback transfer between two in-process sessions
    Demo(DemoArgs),

    /// Send a text message through a loopback transfer
    SendText(SendTextArgs),

    /// View transfer history
    History(HistoryArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the demo command
#[derive(Parser)]
pub struct DemoArgs {
    /// Files to send through the loopback transfer
    pub paths: Vec<PathBuf>,

    /// Text message to send alongside (or instead of) files
    #[arg(short, long)]
    pub text: Option<String>,

    /// Directory to save the received payload into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Skip writing the received payload to disk
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for the send-text command
#[derive(Parser)]
pub struct SendTextArgs {
    /// Text to send (at most 10,000 characters)
    pub text: String,
}

/// Arguments for the history command
#[derive(Parser)]
pub struct HistoryArgs {
    /// Maximum number of records to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Remove all history records
    #[arg(long)]
    pub clear: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Print the config file path and exit
    #[arg(long)]
    pub path: bool,

    /// Write the default configuration to the config file
    #[arg(long)]
    pub reset: bool,
}
