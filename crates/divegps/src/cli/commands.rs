//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::batch::AfterUpload;
use crate::location::Fix;

/// Locate command arguments.
#[derive(Debug, Args)]
pub struct LocateCommand {
    /// Name of the dive site
    #[arg(short, long, default_value = "")]
    pub name: String,

    /// Use this latitude instead of asking gpsd (requires --lon)
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Use this longitude instead of asking gpsd (requires --lat)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Give up waiting for a fix after this many seconds (0 waits forever)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl LocateCommand {
    /// The fix given on the command line, if any.
    #[must_use]
    pub fn manual_fix(&self) -> Option<Fix> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Fix::new(lat, lon)),
            _ => None,
        }
    }
}

/// Send command arguments.
#[derive(Debug, Args)]
pub struct SendCommand {
    /// Keep sent records in the store, marked as sent, instead of deleting them
    #[arg(short, long)]
    pub keep: bool,
}

impl SendCommand {
    /// What to do with a record once it was accepted.
    #[must_use]
    pub fn after_upload(&self) -> AfterUpload {
        if self.keep {
            AfterUpload::MarkSent
        } else {
            AfterUpload::Delete
        }
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show records that still need sending
    #[arg(short, long)]
    pub pending: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the record to delete
    pub id: i64,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
