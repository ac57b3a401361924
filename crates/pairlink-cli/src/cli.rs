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
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted two-device exchange over the in-memory hub
    Demo {
        /// First roster email
        #[arg(long, default_value = "alice@example.com")]
        email_a: String,
        /// Second roster email
        #[arg(long, default_value = "bob@example.com")]
        email_b: String,
        /// Persist each device's store under this directory instead of
        /// keeping it in memory
        #[arg(short, long)]
        data_dir: Option<String>,
    },
    /// Print the channel address derived from an email
    Address {
        /// Email to derive the address for
        email: String,
    },
}
