//! Segment transcode engines

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::model::{Segment, SegmentResult};
use crate::error::SmartSplitResult;

pub mod encoder_config;
pub mod external;
pub mod native;
pub mod progress;

pub use encoder_config::{EncoderConfig, EncoderConfigFactory};
pub use external::ExternalProcessEngine;
pub use native::{NativeCodecEngine, WatchdogLimits};
pub use progress::{
    ConsoleProgressCallback, JsonProgressCallback, ProgressCallback, ProgressSink, SplitProgress,
};

/// Everything an engine needs to produce one segment file
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentJob {
    pub input_path: PathBuf,
    pub segment: Segment,
    pub encoder: EncoderConfig,
    pub output_file: PathBuf,
}

/// A backend that turns one segment of the input into one output file
///
/// Failures are reported inside the returned [`SegmentResult`]. `Err` is
/// reserved for cancellation and conditions that make the whole run pointless.
/// A cancelled engine removes its partial output before returning.
#[async_trait]
pub trait SegmentTranscodeEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcode(
        &self,
        job: SegmentJob,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> SmartSplitResult<SegmentResult>;
}

/// Remove a partial output file, ignoring a missing one
pub(crate) async fn discard_partial_output(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
