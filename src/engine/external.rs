//! External-process transcode engine

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::model::{tail_chars, truncate_chars, SegmentResult, MAX_LOG_EXCERPT_CHARS};
use crate::engine::{
    discard_partial_output, EncoderConfig, ProgressSink, SegmentJob, SegmentTranscodeEngine,
};
use crate::error::{SmartSplitResult, SplitError};
use crate::ports::{TranscoderCompletion, TranscoderEvent, TranscoderPort};

/// Fallback error line length
pub const MAX_ERROR_LINE_CHARS: usize = 200;

/// Sentinel used when the log carries nothing useful
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Known log fragments, hardware codec errors first
const FAILURE_PATTERNS: &[(&str, &str)] = &[
    ("MediaCodec configure failed", "Hardware MediaCodec encoder failed"),
    ("Failed to create MediaCodec", "Hardware MediaCodec encoder failed"),
    ("MediaCodec encoder is not supported", "Hardware MediaCodec encoder failed"),
    ("No NVENC capable devices found", "NVENC hardware encoder unavailable"),
    ("OpenEncodeSessionEx failed", "NVENC encoder session could not be opened"),
    ("Failed to initialise VAAPI", "VAAPI hardware encoder unavailable"),
    ("Error creating a MFX session", "Quick Sync hardware encoder unavailable"),
    ("Error while opening encoder", "Encoder could not be opened for this stream"),
    ("Unknown encoder", "Requested encoder is not available"),
    ("No such file or directory", "Input or output file not found"),
    ("Permission denied", "Permission denied accessing input or output"),
    ("No space left on device", "No space left on device"),
    ("Invalid data found when processing input", "Input file is corrupt or unsupported"),
    ("moov atom not found", "Input file is incomplete (moov atom missing)"),
    ("Conversion failed", "Conversion failed"),
];

/// Flags the platform hardware encoder wrapper ignores or rejects
const HARDWARE_UNSUPPORTED_FLAGS: &[&str] = &["-profile:v", "-profile", "-level", "-level:v"];

/// Human-readable failure reason from a transcoder log
///
/// Known patterns win in table order; otherwise the last non-blank line is
/// used, truncated; otherwise [`UNKNOWN_ERROR`].
pub fn extract_failure_reason(log: &str) -> String {
    let lower = log.to_lowercase();
    for (needle, reason) in FAILURE_PATTERNS {
        if lower.contains(&needle.to_lowercase()) {
            return (*reason).to_string();
        }
    }

    log.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| truncate_chars(line, MAX_ERROR_LINE_CHARS))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// Drop flag/value pairs the hardware encoder wrapper does not honor
pub fn strip_unsupported_hardware_flags(params: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(params.len());
    let mut iter = params.iter();
    while let Some(param) = iter.next() {
        if HARDWARE_UNSUPPORTED_FLAGS.contains(&param.as_str()) {
            iter.next();
            continue;
        }
        kept.push(param.clone());
    }
    kept
}

/// Percent of the segment processed, clamped to [0, 100]
pub fn progress_percent(processed_ms: u64, target_ms: u64) -> f32 {
    if target_ms == 0 {
        return 0.0;
    }
    ((processed_ms as f64 / target_ms as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Engine that runs one transcoder session per segment
pub struct ExternalProcessEngine {
    transcoder: Arc<dyn TranscoderPort>,
    audio_bitrate: String,
}

impl ExternalProcessEngine {
    pub fn new(transcoder: Arc<dyn TranscoderPort>) -> Self {
        Self {
            transcoder,
            audio_bitrate: "128k".to_string(),
        }
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    /// Argument list for one segment
    pub fn build_args(&self, job: &SegmentJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".to_string(),
            "-ss".to_string(),
            format!("{:.3}", job.segment.start_seconds),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", job.segment.duration_seconds),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "0:a:0?".to_string(),
            "-c:v".to_string(),
            job.encoder.codec.clone(),
        ];
        args.extend(self.codec_params(&job.encoder));
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]);
        if !job.encoder.hardware_accelerated {
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }
        args.extend([
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            job.output_file.to_string_lossy().to_string(),
        ]);
        args
    }

    fn codec_params(&self, encoder: &EncoderConfig) -> Vec<String> {
        if encoder.hardware_accelerated {
            strip_unsupported_hardware_flags(&encoder.params)
        } else {
            encoder.params.clone()
        }
    }

    fn render_command(&self, args: &[String]) -> String {
        let mut command = self.transcoder.program();
        for arg in args {
            command.push(' ');
            if arg.contains(' ') {
                command.push('"');
                command.push_str(arg);
                command.push('"');
            } else {
                command.push_str(arg);
            }
        }
        command
    }

    fn handle_event(event: TranscoderEvent, target_ms: u64, progress: &ProgressSink, index: usize) {
        match event {
            TranscoderEvent::Statistics { time_ms } => {
                progress(progress_percent(time_ms, target_ms))
            }
            TranscoderEvent::Log(line) => debug!(segment = index, "transcoder: {}", line),
        }
    }

    async fn run_session(
        &self,
        args: Vec<String>,
        target_ms: u64,
        progress: &ProgressSink,
        index: usize,
        cancel: CancellationToken,
    ) -> SmartSplitResult<TranscoderCompletion> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = self.transcoder.execute(args, tx, cancel);
        tokio::pin!(session);

        let completion = loop {
            tokio::select! {
                done = &mut session => break done,
                Some(event) = rx.recv() => Self::handle_event(event, target_ms, progress, index),
            }
        };
        while let Ok(event) = rx.try_recv() {
            Self::handle_event(event, target_ms, progress, index);
        }
        completion
    }
}

#[async_trait]
impl SegmentTranscodeEngine for ExternalProcessEngine {
    fn name(&self) -> &'static str {
        "external-process"
    }

    async fn transcode(
        &self,
        job: SegmentJob,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> SmartSplitResult<SegmentResult> {
        let index = job.segment.index;
        let hardware = job.encoder.hardware_accelerated;
        let args = self.build_args(&job);
        let command = self.render_command(&args);
        info!(segment = index, encoder = %job.encoder.codec, "Transcoding {}", job.segment);
        debug!(segment = index, "Command: {}", command);

        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let completion = match self
            .run_session(args, job.segment.duration_ms(), &progress, index, cancel.clone())
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                discard_partial_output(&job.output_file).await;
                if cancel.is_cancelled() {
                    return Err(SplitError::Cancelled);
                }
                warn!(segment = index, "Transcoder session could not run: {}", e);
                return Ok(SegmentResult::failure(index, e.to_string(), hardware)
                    .with_diagnostics(Some(command), None));
            }
        };

        if completion.cancelled || cancel.is_cancelled() {
            discard_partial_output(&job.output_file).await;
            info!(segment = index, "Transcoder session cancelled");
            return Err(SplitError::Cancelled);
        }

        if completion.succeeded() && output_exists(&job.output_file).await {
            progress(100.0);
            info!(segment = index, "Segment written to {}", job.output_file.display());
            return Ok(SegmentResult::success(index, job.output_file.clone(), hardware));
        }

        let reason = if completion.succeeded() {
            "Transcoder reported success but produced no output".to_string()
        } else {
            extract_failure_reason(&completion.log)
        };
        warn!(
            segment = index,
            return_code = ?completion.return_code,
            "Segment failed: {}",
            reason
        );
        discard_partial_output(&job.output_file).await;
        Ok(SegmentResult::failure(index, reason, hardware).with_diagnostics(
            Some(command),
            Some(tail_chars(&completion.log, MAX_LOG_EXCERPT_CHARS)),
        ))
    }
}

async fn output_exists(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}
