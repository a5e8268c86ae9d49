//! CLI Module
//!
//! Command-line interface for voxshift.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// voxshift - offline voice effects for recorded takes
#[derive(Parser, Debug)]
#[command(name = "voxshift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available effects
    #[command(name = "effects")]
    Effects {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,

        /// Additional effect definitions (JSON array)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Render a WAV file through an effect
    #[command(name = "render")]
    Render {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Effect id
        #[arg(short, long)]
        effect: String,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Fixed reverb seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Additional effect definitions (JSON array)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Print the header and levels of a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },

    /// Record a WAV file through a full session and export both takes
    #[command(name = "session")]
    Session {
        /// WAV file standing in for the microphone
        #[arg(short, long)]
        input: PathBuf,

        /// Effect id
        #[arg(short, long)]
        effect: String,

        /// Directory for the exported files
        #[arg(long)]
        out_dir: PathBuf,

        /// Let the capture run for the length of the take, printing levels
        #[arg(long)]
        realtime: bool,

        /// Additional effect definitions (JSON array)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}
