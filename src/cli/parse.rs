//! CLI parse: clap types for Sitenav. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sitenav CLI - content-managed site navigation
#[derive(Parser)]
#[command(name = "sitenav")]
#[command(about = "Keep CMS pages in step with site routes and manage navigation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the site's registered routes
    Routes {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create pages for routes that have none
    Sync,
    /// Load navigation and, if it degrades, run the force-bootstrap restore
    Bootstrap,
    /// Show the assembled navigation (or the fallback when degraded)
    Nav {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List stored pages
    Pages {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Content block commands (list, reorder)
    Blocks {
        #[command(subcommand)]
        command: BlocksCommands,
    },
}

#[derive(Subcommand)]
pub enum BlocksCommands {
    /// List a page's blocks in order
    List {
        /// Page slug
        page: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reorder a page's blocks; every block id must be listed once
    Reorder {
        /// Page slug
        page: String,
        /// Block ids in their new order
        #[arg(required = true)]
        ids: Vec<u64>,
    },
}

impl Commands {
    /// Stable command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Routes { .. } => "routes",
            Commands::Sync => "sync",
            Commands::Bootstrap => "bootstrap",
            Commands::Nav { .. } => "nav",
            Commands::Pages { .. } => "pages",
            Commands::Blocks {
                command: BlocksCommands::List { .. },
            } => "blocks.list",
            Commands::Blocks {
                command: BlocksCommands::Reorder { .. },
            } => "blocks.reorder",
        }
    }
}
