use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod commands;
pub mod output;

#[derive(Parser)]
#[command(
    name = "depscope",
    version,
    about = "Static dependency resolution for JavaScript and TypeScript check scripts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Settings shared by every command that resolves files.
#[derive(Args, Clone, Debug, Default)]
pub struct SessionArgs {
    /// Path to config file (default: .depscope/config.toml or depscope.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Additional external module available in the sandbox (repeatable)
    #[arg(long = "supported-module", global = true)]
    pub supported_modules: Vec<String>,

    /// Do not report unsupported external dependencies
    #[arg(long, global = true)]
    pub no_check_external: bool,

    /// Reject local files outside the workspace root
    #[arg(long, global = true)]
    pub restricted: bool,

    /// Skip package manager and workspace detection
    #[arg(long, global = true)]
    pub no_workspace: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the local files each entrypoint depends on
    Resolve {
        /// Entrypoint files
        #[arg(required = true)]
        entrypoints: Vec<PathBuf>,
    },

    /// Collect test files matched by the configured match rules
    Collect {
        /// Directory the match rules are relative to (default: current directory)
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Show the detected package manager and workspace members
    Workspace {
        /// Directory to inspect (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Compact,
}
