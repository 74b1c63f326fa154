//! Command-line interface for narrate
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Sentence-wise speech synthesis stitched into one WAV
#[derive(Parser, Debug)]
#[command(
    name = "narrate",
    version,
    about = "Sentence-wise speech synthesis stitched into one WAV"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress and status output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Where the script text comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct TextArgs {
    /// Text to speak (reads stdin when neither TEXT nor --file is given)
    #[arg(value_name = "TEXT", conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Voice and delivery options shared by the synthesis commands.
#[derive(Args, Debug, Clone, Default)]
pub struct VoiceArgs {
    /// Prebuilt voice name (default: Kore)
    #[arg(long, value_name = "NAME")]
    pub voice: Option<String>,

    /// Spoken language (default: English)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Speaking rate multiplier (default: 1.0)
    #[arg(long, value_name = "FACTOR", value_parser = parse_positive_f32)]
    pub speed: Option<f32>,

    /// Pitch hint, e.g. low, normal, high (default: normal)
    #[arg(long, value_name = "PITCH")]
    pub pitch: Option<String>,

    /// Free-form tone description, e.g. "warm and calm"
    #[arg(long, value_name = "DESCRIPTION")]
    pub style: Option<String>,
}

/// Background and effect layers.
#[derive(Args, Debug, Clone, Default)]
pub struct EnhancementArgs {
    /// Background track to loop under the narration (URL or path)
    #[arg(long, value_name = "SOURCE")]
    pub background: Option<String>,

    /// Background volume (default: generation.background_gain)
    #[arg(long, value_name = "GAIN", value_parser = parse_gain, requires = "background")]
    pub background_gain: Option<f32>,

    /// Let the analysis model place sound effects after fitting sentences
    #[arg(long)]
    pub smart_effects: bool,
}

/// Parse a strictly positive float.
fn parse_positive_f32(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be a positive number, got {s}"))
    }
}

/// Parse a non-negative finite gain.
fn parse_gain(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("gain must be zero or positive, got {s}"))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Narrate text with a prebuilt voice
    Speak {
        #[command(flatten)]
        input: TextArgs,

        #[command(flatten)]
        voice: VoiceArgs,

        #[command(flatten)]
        enhancements: EnhancementArgs,

        /// Output WAV path (default: narrate-<timestamp>.wav)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Narrate text in the voice of a reference recording
    Clone {
        /// Reference WAV sample of the voice to mimic
        #[arg(long, short = 'r', value_name = "WAV")]
        reference: PathBuf,

        #[command(flatten)]
        input: TextArgs,

        /// Characters per request (default: generation.clone_chunk_chars)
        #[arg(long, value_name = "N")]
        chunk_chars: Option<usize>,

        #[command(flatten)]
        enhancements: EnhancementArgs,

        /// Output WAV path (default: narrate-<timestamp>.wav)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Narrate every non-empty line of a file into its own WAV
    Batch {
        /// File with one text per line
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory for the generated files
        #[arg(long, short = 'd', value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// File name prefix; files are named <prefix>-<n>.wav
        #[arg(long, value_name = "PREFIX", default_value = "narration")]
        prefix: String,

        #[command(flatten)]
        voice: VoiceArgs,

        #[command(flatten)]
        enhancements: EnhancementArgs,
    },

    /// List the available sound effect keys
    Effects,

    /// View and modify configuration
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

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., generation.sample_rate)
    Get {
        /// Dotted key path (e.g., provider.tts_model, generation.max_retries)
        key: String,
    },
    /// Set a configuration value by key
    Set {
        /// Dotted key path (e.g., provider.tts_model, effects.gong)
        key: String,
        /// Value to set
        value: String,
    },
    /// Print the effective configuration (optionally one section)
    List {
        /// Config section to show (provider, generation, effects)
        section: Option<String>,
    },
    /// Print the configuration file path
    Path,
}
