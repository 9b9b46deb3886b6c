//! Engine driving platform codec primitives directly
//!
//! The decoder renders into the encoder's input surface, the encoder output
//! is multiplexed into an MP4 file, and audio is copied as-is. All codec work
//! happens on a blocking thread.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{discard_partial_output, ProgressSink, SegmentJob, SegmentTranscodeEngine};
use crate::domain::model::{FailureKind, SegmentResult};
use crate::error::{SmartSplitResult, SplitError};
use crate::ports::codec::CodecPlatform;

pub mod pipeline;
pub mod watchdog;

pub use pipeline::{encoder_format_for, PipelineState, SegmentWindow};
pub use watchdog::{Watchdog, WatchdogLimits, WatchdogTrip};


/// Hardware engine on top of a [`CodecPlatform`]
pub struct NativeCodecEngine {
    platform: Arc<dyn CodecPlatform>,
    limits: WatchdogLimits,
}

impl NativeCodecEngine {
    pub fn new(platform: Arc<dyn CodecPlatform>) -> Self {
        Self {
            platform,
            limits: WatchdogLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: WatchdogLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> WatchdogLimits {
        self.limits
    }
}

#[async_trait]
impl SegmentTranscodeEngine for NativeCodecEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn transcode(
        &self,
        job: SegmentJob,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> SmartSplitResult<SegmentResult> {
        let index = job.segment.index;
        let hardware = job.encoder.hardware_accelerated;
        info!(segment = index, "Transcoding {} on platform codecs", job.segment);

        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let platform = Arc::clone(&self.platform);
        let limits = self.limits;
        let worker_job = job.clone();
        let worker_cancel = cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            pipeline::run_segment(
                platform.as_ref(),
                &worker_job,
                limits,
                &progress,
                &worker_cancel,
            )
        })
        .await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                discard_partial_output(&job.output_file).await;
                warn!(segment = index, "Codec worker aborted: {}", e);
                return Ok(SegmentResult::failure(
                    index,
                    format!("Codec worker aborted: {}", e),
                    hardware,
                ));
            }
        };

        match outcome {
            Ok(()) => {
                info!(segment = index, "Segment written to {}", job.output_file.display());
                Ok(SegmentResult::success(index, job.output_file.clone(), hardware))
            }
            Err(SplitError::Cancelled) => {
                discard_partial_output(&job.output_file).await;
                info!(segment = index, "Codec session cancelled");
                Err(SplitError::Cancelled)
            }
            Err(SplitError::Watchdog { message }) => {
                discard_partial_output(&job.output_file).await;
                warn!(segment = index, "Hardware session unresponsive: {}", message);
                Ok(SegmentResult::failure(index, message, hardware)
                    .with_kind(FailureKind::Unresponsive))
            }
            Err(e) => {
                discard_partial_output(&job.output_file).await;
                warn!(segment = index, "Segment failed: {}", e);
                Ok(SegmentResult::failure(index, e.to_string(), hardware))
            }
        }
    }
}
