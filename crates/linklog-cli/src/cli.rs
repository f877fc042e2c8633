use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "linklog")]
#[command(about = "Save profile snapshots and sync them to your sheet")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local state database
    #[arg(long, global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,

    /// Optional path to the CLI config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a profile row (appends the first time, updates afterwards)
    Save {
        /// Profile URL; identifies the row
        #[arg(long, value_name = "URL", required_unless_present = "json")]
        url: Option<String>,
        /// Person's name
        #[arg(long)]
        name: Option<String>,
        /// Job title
        #[arg(long)]
        title: Option<String>,
        /// Company
        #[arg(long)]
        company: Option<String>,
        /// When the connection was requested (defaults to now)
        #[arg(long, value_name = "TIMESTAMP")]
        requested_at: Option<String>,
        /// Follow-up date, normalized to YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        follow_up: Option<String>,
        /// Free-form tag
        #[arg(long)]
        tag: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
        /// Read the record from a JSON file (`-` for stdin)
        #[arg(
            long,
            value_name = "FILE",
            conflicts_with_all = ["url", "name", "title", "company", "requested_at", "follow_up", "tag", "notes"]
        )]
        json: Option<PathBuf>,
    },
    /// Retry every queued write now
    Flush {
        /// Output the drain report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep draining the queue periodically until interrupted
    Run,
    /// Show queue, index and configuration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued writes
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records known to the remote sheet
    Index {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export queued records as CSV
    Export {
        /// Output file, or directory for a timestamped file (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Check that the remote endpoint accepts our credentials
    Test,
    /// Manage the CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Remote endpoint URL
        #[arg(long, value_name = "URL")]
        endpoint_url: Option<String>,
        /// Bearer token for the endpoint
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
        /// Seconds between background drains in `linklog run`
        #[arg(long, value_name = "SECS")]
        drain_interval_secs: Option<u64>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
