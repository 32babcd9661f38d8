//! Command-line interface for the `divegps` binary.

mod commands;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DeleteCommand, ListCommand, LocateCommand, SendCommand, StatusCommand,
};
pub use run::{ctrl_c_interrupts, run_flow};

/// divegps - Record where you dived
///
/// Captures a GPS fix for a dive site and sends it to your online dive log.
/// Fixes that cannot be sent right away are kept locally until `send`.
#[derive(Debug, Parser)]
#[command(name = "divegps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Capture a fix for a dive site and send it
    Locate(LocateCommand),

    /// Send all stored locations
    Send(SendCommand),

    /// List stored locations
    List(ListCommand),

    /// Delete a stored location
    Delete(DeleteCommand),

    /// Show store status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
