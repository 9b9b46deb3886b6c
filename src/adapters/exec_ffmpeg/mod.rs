//! FFmpeg subprocess transcoder
//!
//! Runs one ffmpeg process per session. Machine-readable progress is read
//! from `-progress pipe:1` on stdout; the human log comes from stderr.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{SmartSplitResult, SplitError};
use crate::ports::{TranscoderCompletion, TranscoderEvent, TranscoderPort};

/// Arguments prepended to every session
const SESSION_PREAMBLE: [&str; 5] = ["-nostdin", "-progress", "pipe:1", "-nostats", "-loglevel"];
const SESSION_LOG_LEVEL: &str = "info";

/// Parse one `key=value` line of ffmpeg's progress stream into media milliseconds
pub fn parse_progress_line(line: &str) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    if key != "out_time_us" {
        return None;
    }
    let micros: i64 = value.trim().parse().ok()?;
    Some((micros.max(0) / 1000) as u64)
}

/// [`TranscoderPort`] backed by an ffmpeg executable
pub struct FfmpegProcessAdapter {
    program: PathBuf,
}

impl FfmpegProcessAdapter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegProcessAdapter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl TranscoderPort for FfmpegProcessAdapter {
    async fn execute(
        &self,
        args: Vec<String>,
        events: mpsc::UnboundedSender<TranscoderEvent>,
        cancel: CancellationToken,
    ) -> SmartSplitResult<TranscoderCompletion> {
        let mut child = Command::new(&self.program)
            .args(SESSION_PREAMBLE)
            .arg(SESSION_LOG_LEVEL)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SplitError::Transcoder {
                message: format!("Failed to start {}: {}", self.program.display(), e),
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SplitError::Transcoder {
                message: "Transcoder pipes unavailable".to_string(),
            });
        };

        let stats_events = events.clone();
        let stats_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(time_ms) = parse_progress_line(&line) {
                    let _ = stats_events.send(TranscoderEvent::Statistics { time_ms });
                }
            }
        });

        let log_task = tokio::spawn(async move {
            let mut log = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log.push_str(&line);
                log.push('\n');
                let _ = events.send(TranscoderEvent::Log(line));
            }
            log
        });

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let status = match finished {
            Some(status) => Some(status?),
            None => {
                debug!("Killing transcoder process after cancellation");
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill transcoder process: {}", e);
                }
                None
            }
        };

        if let Err(e) = stats_task.await {
            warn!("Progress reader task failed: {}", e);
        }
        let log = log_task.await.unwrap_or_default();

        Ok(match status {
            Some(status) => TranscoderCompletion {
                return_code: status.code(),
                log,
                cancelled: false,
            },
            None => TranscoderCompletion {
                return_code: None,
                log,
                cancelled: true,
            },
        })
    }

    fn program(&self) -> String {
        self.program.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("out_time_us=2500000"), Some(2500));
        assert_eq!(parse_progress_line("out_time_us=-40000"), Some(0));
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("out_time=00:00:02.500000"), None);
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_transcoder_error() {
        let adapter = FfmpegProcessAdapter::new("/nonexistent/ffmpeg-binary");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = adapter
            .execute(vec!["-version".to_string()], tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::Transcoder { .. }));
        assert_eq!(adapter.program(), "/nonexistent/ffmpeg-binary");
    }
}
