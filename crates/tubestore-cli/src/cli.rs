//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use tubestore_persistence::{default_data_path, StoreConfig};

/// tubestore - inspect and maintain a local channel/video/transcript dataset
#[derive(Parser, Debug)]
#[command(name = "tubestore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the dataset file
    #[arg(short, long, env = "TUBESTORE_DATA_PATH", global = true)]
    pub data: Option<PathBuf>,

    /// How long to wait for another process holding the dataset (milliseconds)
    #[arg(long, default_value_t = 5000, global = true)]
    pub lock_timeout_ms: u64,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show dataset location and collection sizes
    Status,

    /// List channels
    Channels,

    /// List videos
    Videos {
        /// Only videos of this channel (internal or external ID)
        #[arg(short, long)]
        channel: Option<String>,
    },

    /// List videos that still need a transcript
    Pending,

    /// List transcripts of a channel
    Transcripts {
        /// Channel internal or external ID
        #[arg(short, long, required = true)]
        channel: String,
    },

    /// Show a channel's sync state
    Sync {
        /// Channel internal or external ID
        #[arg(short, long, required = true)]
        channel: String,
    },

    /// Check index and transcript-flag consistency
    Verify,

    /// Re-derive all indexes from the stored collections
    RebuildIndexes,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Cli {
    /// Returns the dataset path, using the default location if not specified.
    pub fn data_path(&self) -> PathBuf {
        self.data.clone().unwrap_or_else(default_data_path)
    }

    /// Store configuration derived from the arguments.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.data_path())
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }

    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
