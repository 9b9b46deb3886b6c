//! SmartSplit video splitter
//!
//! Splits a video into fixed-length MP4 segments with hardware encoding and
//! software fallback.
//!
//! # Usage
//!
//! ```bash
//! splitter split --input talk.mp4 --output-dir clips --interval 30
//! splitter split -i talk.mp4 -o clips -n 30 --parallel --quality fast
//! splitter capabilities --refresh --json
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use smart_split::adapters::init_logging;
use smart_split::app::DefaultAppContainer;
use smart_split::cli::{commands, Cli, Commands};
use smart_split::config_initialization::initialize_configuration_hierarchy;

/// Main entry point for the splitter CLI
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = initialize_configuration_hierarchy(&cli)?;
    init_logging(&settings.logging)?;
    info!("Starting SmartSplit video splitter");

    let container = DefaultAppContainer::new(&settings);

    let code = match cli.command {
        Commands::Split(args) => {
            info!("Executing split command");
            commands::split(&container, args).await?
        }
        Commands::Capabilities(args) => {
            info!("Executing capabilities command");
            commands::capabilities(&container, args).await?
        }
    };

    Ok(code)
}
