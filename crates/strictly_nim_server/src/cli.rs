//! Command-line interface for strictly_nim.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Nim - misère Nim against a computer opponent
#[derive(Parser, Debug)]
#[command(name = "strictly_nim")]
#[command(about = "Misère Nim server and terminal client", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Path to the database file (created if it doesn't exist).
        /// Games are kept in memory when omitted.
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Play a game in the terminal
    Play {
        /// Game server URL. If not provided, plays against a local engine.
        #[arg(long)]
        server_url: Option<String>,

        /// Number of matches at the start
        #[arg(long)]
        matches: Option<i64>,

        /// Allowed moves, comma separated (e.g. 1,2,3)
        #[arg(long, value_delimiter = ',')]
        moves: Option<Vec<i64>>,

        /// Computer strategy (RANDOM or DP)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Print the DP policy table for a heap and move set
    Solve {
        /// Number of matches
        #[arg(long, default_value = "13")]
        matches: u32,

        /// Allowed moves, comma separated
        #[arg(long, default_value = "1,2,3")]
        moves: String,
    },
}
