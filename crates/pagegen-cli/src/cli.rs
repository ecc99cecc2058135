//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # Inspect routing
//! pagegen classify /forex/us
//! pagegen urls --limit 20
//!
//! # Build pages
//! pagegen page /forex/us /country/gb --brokers brokers.json --stats
//! pagegen warm --brokers brokers.json --concurrency 4
//!
//! # Durable-tier maintenance
//! pagegen invalidate --tag category:forex
//! pagegen sweep
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI structure for the `pagegen` command
#[derive(Parser, Clone, Debug)]
#[command(name = "pagegen")]
#[command(version)]
#[command(about = "pagegen - programmatic SEO pages for broker comparison sites", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Format of log lines written to stderr
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Path to configuration file. Also via `PAGEGEN_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "PAGEGEN_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands for the `pagegen` CLI
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Classify a URL path and print the page intent as JSON
    Classify {
        /// Path to classify, e.g. `/forex/us`
        path: String,
    },

    /// List every programmatic URL
    Urls {
        /// Print at most this many URLs
        #[arg(long)]
        limit: Option<usize>,
        /// Print a JSON array instead of one URL per line
        #[arg(long)]
        json: bool,
    },

    /// Build pages and print their payloads as JSON
    Page {
        /// Paths to build
        #[arg(required = true)]
        paths: Vec<String>,
        /// JSON file with broker records
        #[arg(long, value_name = "FILE")]
        brokers: PathBuf,
        /// Print cache statistics to stderr afterwards
        #[arg(long)]
        stats: bool,
    },

    /// Pre-build every programmatic URL into the cache
    Warm {
        /// JSON file with broker records
        #[arg(long, value_name = "FILE")]
        brokers: PathBuf,
        /// Maximum pages built at once
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
        /// Only warm the first N URLs
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove cached pages carrying any of the given tags
    Invalidate {
        /// Tag such as `category:forex` or `page-type:broker`
        #[arg(long = "tag", required = true, value_name = "TAG")]
        tags: Vec<String>,
    },

    /// Remove expired entries from the durable cache
    Sweep,
}
