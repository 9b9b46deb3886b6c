// Tracing log adapter - Structured logging using tracing crate

use tracing_subscriber::EnvFilter;

use crate::adapters::toml_config::{LogFormat, LoggingSettings};
use crate::error::{SmartSplitResult, SplitError};

/// Filter from `RUST_LOG` when set, otherwise the configured level
pub fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber; logs go to stderr so stdout stays machine-readable
pub fn init_logging(settings: &LoggingSettings) -> SmartSplitResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(settings))
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match settings.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| SplitError::Config {
        message: format!("Failed to initialise logging: {}", e),
    })
}
