//! Configuration initialization and hierarchy management

use anyhow::{Context, Result};
use tracing::debug;

use crate::adapters::SplitterSettings;
use crate::cli::{Cli, Commands};

/// Resolve settings following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(cli: &Cli) -> Result<SplitterSettings> {
    let mut settings =
        SplitterSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    apply_cli_configuration_overrides(&mut settings, cli);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_configuration_overrides(settings: &mut SplitterSettings, cli: &Cli) {
    let mut cli_overrides = 0;

    if let Some(level) = &cli.log_level {
        settings.logging.level = level.trim().to_lowercase();
        cli_overrides += 1;
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        settings.ffmpeg_path = ffmpeg.clone();
        cli_overrides += 1;
    }
    if let Some(ffprobe) = &cli.ffprobe {
        settings.ffprobe_path = ffprobe.clone();
        cli_overrides += 1;
    }

    if let Commands::Split(args) = &cli.command {
        if let Some(max_parallel) = args.max_parallel {
            settings.max_parallel = Some(max_parallel);
            cli_overrides += 1;
        }
        if let Some(threshold) = args.failure_threshold {
            settings.hardware_failure_threshold = threshold;
            cli_overrides += 1;
        }
    }

    if cli_overrides > 0 {
        debug!("Applied {} CLI configuration overrides", cli_overrides);
    }
}
