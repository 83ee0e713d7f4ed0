//! Command-line interface for clinscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Transcribe long clinical recordings through size-limited speech-to-text providers
#[derive(Parser, Debug)]
#[command(
    name = "clinscribe",
    version,
    about = "Transcribe long clinical recordings through size-limited speech-to-text providers"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress notices and progress (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout such as `90`, `90s`, `2m` or `1m30s`.
///
/// Bare numbers are seconds; anything else goes through `humantime`.
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe an audio file through the configured provider
    Transcribe {
        /// Recording to transcribe
        file: PathBuf,

        /// Declared MIME type (default: inferred from the file extension)
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,

        /// Language code (default: from config). Use "auto" for detection
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Vocabulary hint passed to the provider (names, drugs, procedures)
        #[arg(long, value_name = "TEXT")]
        prompt: Option<String>,

        /// Decoding temperature between 0.0 and 1.0
        #[arg(long, value_name = "T")]
        temperature: Option<f32>,

        /// Per-segment provider timeout. Examples: 90, 90s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
        timeout: Option<Duration>,

        /// Print the JSON response envelope instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Show how a recording would be segmented, without calling the provider
    Plan {
        /// Recording to inspect
        file: PathBuf,

        /// Declared MIME type (default: inferred from the file extension)
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,

        /// Override the provider ceiling in bytes
        #[arg(long, value_name = "BYTES")]
        max_bytes: Option<u64>,
    },

    /// List supported audio formats
    Formats,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
