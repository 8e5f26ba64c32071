// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// artgrep - Local semantic image search tool
///
/// Indexes image collections with a joint image/text embedding model and
/// finds pictures from a natural-language description.
#[derive(Parser, Debug)]
#[command(name = "artgrep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Index directory (defaults to .artgrep or the configured [index] dir)
    #[arg(long, global = true)]
    pub index_dir: Option<String>,

    /// Config file to use instead of the .artgreprc.toml lookup
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search images by description
    #[command(visible_alias = "s")]
    Search {
        /// What to look for, in natural language
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long = "limit", visible_alias = "max-results")]
        limit: Option<usize>,

        /// Only images whose name or path matches this glob (e.g. "*.png")
        #[arg(short = 'g', long)]
        glob: Option<String>,

        /// Only images under this directory
        #[arg(long = "dir")]
        directory: Option<String>,

        /// Only images from this collection
        #[arg(long)]
        collection: Option<String>,

        /// Drop results with a lower similarity score
        #[arg(long)]
        min_score: Option<f32>,

        /// Do not build the index when it is empty
        #[arg(long)]
        no_build: bool,

        /// Image directories (repeatable, overrides configured collections)
        #[arg(short, long = "path")]
        paths: Vec<String>,
    },

    /// Build or update the image index
    Index {
        /// Image directories (repeatable, overrides configured collections)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// Discard the index and embed every image again
        #[arg(short, long)]
        force: bool,

        /// Only index images directly inside each directory
        #[arg(long)]
        no_recursive: bool,
    },

    /// Show index status and recent runs
    Status,

    /// List image files that would be indexed
    Scan {
        /// Image directories (repeatable, overrides configured collections)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// Only list images directly inside each directory
        #[arg(long)]
        no_recursive: bool,
    },

    /// Watch collections for new images and update the index
    Watch {
        /// Image directories (repeatable, overrides configured collections)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// Debounce interval in seconds (default: 2)
        #[arg(long, default_value = "2")]
        debounce: u64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
