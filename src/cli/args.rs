//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::domain::model::QualityPreset;

/// Arguments for the split command
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving the segment files
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Segment length in seconds
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub interval: u32,

    /// Output file name prefix
    #[arg(long, default_value = "segment")]
    pub prefix: String,

    /// Encoding quality preset (fast, balanced, quality)
    #[arg(short, long, default_value = "balanced")]
    pub quality: QualityPreset,

    /// Transcode segments concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Never use a hardware encoder
    #[arg(long)]
    pub no_hardware: bool,

    /// Source duration in milliseconds (skips probing)
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Source width (skips probing together with --height and --duration-ms)
    #[arg(long)]
    pub width: Option<u32>,

    /// Source height
    #[arg(long)]
    pub height: Option<u32>,

    /// Worker pool size for --parallel
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Consecutive hardware failures before switching to software
    #[arg(long)]
    pub failure_threshold: Option<u32>,

    /// Print progress and the result as JSON
    #[arg(long)]
    pub json: bool,

    /// One progress line per update instead of a single redrawn line
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the capabilities command
#[derive(Args, Debug)]
pub struct CapabilitiesArgs {
    /// Re-enumerate the codec registry
    #[arg(long)]
    pub refresh: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
