use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clopetracker")]
#[command(author, version, about = "Smoking tracker with avatar upload pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Normalize an image the way avatar uploads are normalized
    Normalize {
        /// Image to normalize
        #[arg(required = true)]
        input: PathBuf,

        /// Directory to write the result to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Delete stored avatars that no profile refers to
    PruneOrphans {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
