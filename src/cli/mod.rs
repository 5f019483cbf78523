//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fathom",
    version,
    author = "neur0map",
    about = "Federated retrieval backend with budget-aware lane fusion",
    long_about = "Fathom answers knowledge queries by fanning a request out across retrieval \
                  lanes (web, vector, keyword, knowledge graph, news, markets), walking each \
                  lane's provider chain under a strict time budget, and fusing the results \
                  with reciprocal rank fusion into one cited, deduplicated response."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/fathom/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP retrieval server
    Serve {
        /// Bind address override
        #[arg(short, long)]
        bind: Option<String>,

        /// Port override
        #[arg(short, long)]
        port: Option<u16>,

        /// Profile to use (e.g., "fast", "thorough")
        #[arg(long)]
        profile: Option<String>,
    },

    /// Show lane availability and per-tier budget tables
    Lanes,

    /// Run one retrieval from the command line
    Query {
        /// Query text
        query: String,

        /// Complexity tier (simple, technical, research, multimedia)
        #[arg(short = 't', long, default_value = "simple")]
        complexity: String,

        /// Print the full fused response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
