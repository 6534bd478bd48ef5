use clap::{Parser, Subcommand};
use shelf_core::{DirectoryId, SeriesId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "animeshelf")]
#[command(author, version, about = "Local anime/TV library indexer")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database file (overrides the config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan library roots and index their video files
    Scan {
        /// Root to scan (repeatable); defaults to every registered directory
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Skip metadata enrichment of discovered series
        #[arg(long)]
        no_enrich: bool,
    },

    /// Fetch metadata for series that need it
    Enrich {
        /// Only this series (default: all)
        #[arg(long)]
        series: Option<SeriesId>,
    },

    /// Manage registered directories
    Dir {
        #[command(subcommand)]
        command: DirCommand,
    },

    /// List indexed series
    List,

    /// Remove series that no longer own any episodes
    Cleanup,

    /// Validate configuration file
    Validate,
}

#[derive(Subcommand)]
pub enum DirCommand {
    /// Register a directory for scanning
    Add {
        path: PathBuf,

        /// Free-form note
        #[arg(long)]
        description: Option<String>,
    },

    /// Unregister a directory and drop its series
    Remove { id: DirectoryId },

    /// List registered directories
    List,
}
