//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tidemark - Upload media files added since the last successful run
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Re-run the setup prompts before syncing
    #[arg(long)]
    pub setup: bool,

    /// Scan and report without uploading or changing state
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// State file location
    #[arg(long, env = "TIDEMARK_STATE", global = true)]
    pub state: Option<PathBuf>,

    /// Also write a per-run log file into this directory
    #[arg(long, env = "TIDEMARK_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Optional subcommand; without one a sync run starts
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Inspect or edit the state file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the state file
    Show,

    /// Print the state file location
    Path,

    /// Set one key
    ///
    /// VALUE is parsed as JSON when possible, otherwise taken as a string.
    ///
    /// Examples:
    ///   tidemark config set credentials_file ~/.config/tidemark/oauth.json
    ///   tidemark config set upload_command '["my-uploader", "--quiet"]'
    ///   tidemark config set extensions '["mp3", "flac", "ogg"]'
    Set {
        /// Key name
        key: String,
        /// New value
        value: String,
    },
}
