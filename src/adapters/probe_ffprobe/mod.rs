//! FFprobe adapter for media file probing

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{SmartSplitResult, SplitError};
use crate::ports::{MediaProbePort, MediaSummary};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn seconds_to_ms(value: Option<&str>) -> Option<u64> {
    let seconds: f64 = value?.trim().parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| (seconds * 1000.0).round() as u64)
}

/// Build a [`MediaSummary`] from `ffprobe -print_format json` output
pub fn parse_probe_output(json: &str) -> SmartSplitResult<MediaSummary> {
    let output: ProbeOutput = serde_json::from_str(json)?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SplitError::Probe {
            message: "No video stream found".to_string(),
        })?;

    let duration_ms = output
        .format
        .as_ref()
        .and_then(|f| seconds_to_ms(f.duration.as_deref()))
        .or_else(|| seconds_to_ms(video.duration.as_deref()))
        .ok_or_else(|| SplitError::Probe {
            message: "Media duration unavailable".to_string(),
        })?;

    let (Some(width), Some(height)) = (video.width, video.height) else {
        return Err(SplitError::Probe {
            message: "Video stream has no dimensions".to_string(),
        });
    };

    Ok(MediaSummary {
        duration_ms,
        width,
        height,
        has_audio: output
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// FFprobe-based probe adapter
pub struct FfprobeAdapter {
    program: PathBuf,
}

impl FfprobeAdapter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MediaProbePort for FfprobeAdapter {
    async fn probe(&self, path: &Path) -> SmartSplitResult<MediaSummary> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| SplitError::Probe {
                message: format!("Failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitError::Probe {
                message: format!("{}: {}", path.display(), stderr.trim()),
            });
        }

        let summary = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            duration_ms = summary.duration_ms,
            width = summary.width,
            height = summary.height,
            "Probed {}",
            path.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "duration": "12.000"},
                {"codec_type": "audio", "duration": "12.010"}
            ],
            "format": {"duration": "12.034000"}
        }"#;
        let summary = parse_probe_output(json).unwrap();
        assert_eq!(summary.duration_ms, 12_034);
        assert_eq!((summary.width, summary.height), (1280, 720));
        assert!(summary.has_audio);
    }

    #[test]
    fn test_stream_duration_fallback() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480, "duration": "3.5"}],
            "format": {"duration": "N/A"}
        }"#;
        let summary = parse_probe_output(json).unwrap();
        assert_eq!(summary.duration_ms, 3_500);
        assert!(!summary.has_audio);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(matches!(parse_probe_output(json), Err(SplitError::Probe { .. })));
    }
}
