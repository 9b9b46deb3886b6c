//! Command implementations

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::{AppContainer, DefaultAppContainer};
use crate::cli::args::{CapabilitiesArgs, SplitArgs};
use crate::domain::model::{SplitConfig, SplitResult};
use crate::engine::{ConsoleProgressCallback, JsonProgressCallback, ProgressCallback};
use crate::error::SplitError;
use crate::ports::MediaSummary;
use crate::probe::{CodecCapability, HardwareEncoder};

/// Exit status for a run stopped by Ctrl-C
const EXIT_CANCELLED: u8 = 130;

/// Execute the split command
pub async fn split(container: &DefaultAppContainer, args: SplitArgs) -> Result<ExitCode> {
    info!("Input: {}", args.input.display());
    info!("Output directory: {}", args.output_dir.display());

    if !args.input.is_file() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    let summary = match (args.duration_ms, args.width, args.height) {
        (Some(duration_ms), Some(width), Some(height)) => MediaSummary {
            duration_ms,
            width,
            height,
            has_audio: true,
        },
        (duration_ms, width, height) => {
            let probed = container
                .media_probe()
                .probe(&args.input)
                .await
                .context("Failed to probe input file")?;
            MediaSummary {
                duration_ms: duration_ms.unwrap_or(probed.duration_ms),
                width: width.unwrap_or(probed.width),
                height: height.unwrap_or(probed.height),
                has_audio: probed.has_audio,
            }
        }
    };
    info!(
        "Source: {:.3}s, {}x{}",
        summary.duration_ms as f64 / 1000.0,
        summary.width,
        summary.height
    );

    let config = SplitConfig::new(&args.input, &args.output_dir, args.interval, summary.duration_ms)
        .with_prefix(args.prefix.clone())
        .with_resolution(summary.width, summary.height)
        .with_hardware(!args.no_hardware)
        .with_parallel(args.parallel)
        .with_quality(args.quality);
    config.validate().context("Invalid split request")?;

    let progress: Arc<dyn ProgressCallback> = if args.json {
        Arc::new(JsonProgressCallback)
    } else {
        Arc::new(ConsoleProgressCallback::new(args.verbose))
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling split");
            interrupt.cancel();
        }
    });

    let orchestrator = container.split_orchestrator();
    let outcome = orchestrator.split(&config, progress, cancel).await;
    if !args.json {
        eprintln!();
    }

    let result = match outcome {
        Ok(result) => result,
        Err(SplitError::Cancelled) => {
            eprintln!("Split cancelled");
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
        Err(e) => return Err(e).context("Split failed"),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize split result to JSON")?;
        println!("{}", json);
    } else {
        display_split_result(&result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Execute the capabilities command
pub async fn capabilities(
    container: &DefaultAppContainer,
    args: CapabilitiesArgs,
) -> Result<ExitCode> {
    let capability = container
        .capability_probe()
        .detect_capabilities(args.refresh)
        .await
        .context("Failed to detect encoder capabilities")?;

    if args.json {
        let json = serde_json::to_string_pretty(capability.as_ref())
            .context("Failed to serialize capabilities to JSON")?;
        println!("{}", json);
    } else {
        display_capabilities(&capability);
    }
    Ok(ExitCode::SUCCESS)
}

/// Display split result in human-readable format
fn display_split_result(result: &SplitResult) {
    println!("Split Results");
    println!("=============");
    println!("Success: {}", if result.success { "yes" } else { "no" });
    println!("Hardware accelerated: {}", if result.hardware_accelerated { "yes" } else { "no" });
    println!("Elapsed: {:.2}s", result.elapsed.as_secs_f64());
    println!();

    if !result.output_files.is_empty() {
        println!("Output files:");
        for file in &result.output_files {
            println!("  {}", file.display());
        }
        println!();
    }

    if !result.failures.is_empty() {
        println!("Failed segments:");
        for failure in &result.failures {
            println!("  #{}: {}", failure.index + 1, failure.error);
            if let Some(command) = &failure.command {
                println!("    Command: {}", command);
            }
        }
    }
}

fn display_encoder(label: &str, encoder: Option<&HardwareEncoder>) {
    match encoder {
        Some(encoder) => {
            println!("{}: {}", label, encoder.name);
            if let (Some(width), Some(height)) = (encoder.max_width, encoder.max_height) {
                println!("  Max resolution: {}x{}", width, height);
            }
            if !encoder.bitrate_modes.is_empty() {
                println!("  Bitrate modes: {:?}", encoder.bitrate_modes);
            }
        }
        None => println!("{}: not available", label),
    }
}

/// Display capabilities in human-readable format
fn display_capabilities(capability: &CodecCapability) {
    println!("Hardware Encoders");
    println!("=================");
    display_encoder("H.264", capability.h264.as_ref());
    display_encoder("H.265", capability.hevc.as_ref());
}
