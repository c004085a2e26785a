//! ringfence command line
//!
//! # Commands
//!
//! - `score`: Scan a codebase and score it against its platform layout
//! - `check`: Evaluate one tool call against a scope built from target paths
//! - `run`: Drive the full workflow with a recorded agent transcript
//!
//! Every command prints JSON on stdout; logs go to stderr.

pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

pub use logging::LogFormat;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "ringfence", version, about = "Scope-bounded orchestration of code-modification agents")]
pub struct Cli {
    /// Log format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Shorthand for `--log-format json`
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log format
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            self.log_format
        }
    }
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score a codebase's directory structure
    Score {
        /// Codebase root
        root: PathBuf,
        /// Platform layout to score against (detected from build markers if omitted)
        #[arg(long)]
        platform: Option<String>,
        /// Workflow config (TOML); only the `scoring` table is used
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate a tool call against a scope
    Check {
        /// Codebase root
        root: PathBuf,
        /// Tool name, e.g. `Write`
        tool: String,
        /// Tool arguments as a JSON object
        arguments: String,
        /// Target path; repeat for several
        #[arg(long = "target", short = 't')]
        targets: Vec<String>,
        /// Evaluate as a read-only phase
        #[arg(long)]
        read_only: bool,
        /// Treatment of out-of-scope reads
        #[arg(long, value_enum, default_value_t = ReadMode::Hard)]
        reads: ReadMode,
    },

    /// Run the workflow with a replayed agent
    Run {
        /// Codebase root
        root: PathBuf,
        /// Natural-language change request
        request: String,
        /// JSON transcript of agent turns keyed by phase name
        #[arg(long)]
        transcript: PathBuf,
        /// Workflow config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report summary instead of JSON
        #[arg(long)]
        summary: bool,
    },
}

/// Out-of-scope read treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadMode {
    /// Reject
    Hard,
    /// Allow with a warning
    Soft,
}

/// Execute a parsed command line
///
/// Returns whether the command succeeded: the score has no critical
/// violation, the call is permitted, or the workflow finished.
///
/// # Errors
/// Returns error on unreadable input files or an unusable codebase root
pub async fn execute(cli: Cli, out: &mut impl Write) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Score {
            root,
            platform,
            config,
        } => commands::score(&root, platform.as_deref(), config.as_deref(), out).await,
        Commands::Check {
            root,
            tool,
            arguments,
            targets,
            read_only,
            reads,
        } => commands::check(
            &root,
            &commands::CheckArgs {
                tool,
                arguments,
                targets,
                read_only,
                reads,
            },
            out,
        ),
        Commands::Run {
            root,
            request,
            transcript,
            config,
            summary,
        } => commands::run(&root, &request, &transcript, config.as_deref(), summary, out).await,
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
