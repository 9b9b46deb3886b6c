//! CLI module for the splitter
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{CapabilitiesArgs, SplitArgs};

/// Segment-accurate video splitter
///
/// Splits a video into fixed-length MP4 segments, preferring a hardware
/// encoder and falling back to software when it fails.
#[derive(Parser, Debug)]
#[command(name = "splitter")]
#[command(about = "Split a video into fixed-length segments")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ./splitter.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to the ffmpeg executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long, global = true)]
    pub ffprobe: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a video into segments
    Split(SplitArgs),
    /// Show detected hardware encoders
    Capabilities(CapabilitiesArgs),
}
