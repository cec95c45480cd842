//! Command-line interface for livedub
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Live speech-to-speech dubbing
#[derive(Parser, Debug)]
#[command(name = "livedub", version, about = "Live speech-to-speech dubbing")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress event output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: event records, -vv: stabilization diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines script of recognizer events through the pipeline
    Replay {
        /// Script file (one {"kind", "text", "delay_ms"} object per line)
        script: PathBuf,

        /// Multiplier for simulated synthesis time (0 = instant)
        #[arg(long, value_name = "FACTOR", default_value = "1.0", value_parser = parse_time_scale)]
        time_scale: f64,

        /// Only speak final translations
        #[arg(long)]
        no_intermediate: bool,

        /// Prosody rate override (also selects the calibration record)
        #[arg(long, value_name = "RATE")]
        rate: Option<String>,

        /// How long to wait for in-flight synthesis when stopping. Examples: 500ms, 2s
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
        drain_timeout: Option<u64>,
    },

    /// Inspect or reset the persisted synthesis calibration
    Calibration {
        #[command(subcommand)]
        action: CalibrationAction,
    },

    /// Show configuration
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

/// Calibration management actions
#[derive(Subcommand, Debug)]
pub enum CalibrationAction {
    /// Show the fitted model for a prosody rate (default: configured rate)
    Show {
        #[arg(long, value_name = "RATE")]
        rate: Option<String>,
    },
    /// Forget the fitted model for a prosody rate
    Reset {
        #[arg(long, value_name = "RATE")]
        rate: Option<String>,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (file + environment overrides)
    Show,
}

fn parse_time_scale(s: &str) -> Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("time scale must be a non-negative number, got {s}"));
    }
    Ok(value)
}

/// Parse a duration string into milliseconds.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`
/// (`500ms`, `2s`, `1m30s`).
fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}
