//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Advertised name of the peripheral to connect to
    #[arg(short, long)]
    pub target: Option<String>,

    /// Payload bytes per characteristic write
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Address a short final chunk the way the reference client does
    #[arg(long)]
    pub legacy_addressing: bool,

    /// Seconds to scan before giving up
    #[arg(long)]
    pub scan_timeout: Option<u64>,

    /// Index of the Bluetooth adapter to use
    #[arg(long)]
    pub adapter: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and chat interactively; each line is sent as one message
    Chat,
    /// Connect, send a single message, wait for its echo and exit
    Send {
        /// Message content (ASCII)
        message: String,
    },
    /// Print an example configuration file
    Config,
}
