// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SplitError;

#[cfg(test)]
mod tests;

/// MIME type reported to the media index for every output file
pub const OUTPUT_MIME_TYPE: &str = "video/mp4";

/// Upper bound on the log excerpt kept per failure
pub const MAX_LOG_EXCERPT_CHARS: usize = 2000;

/// Quality preset requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::Balanced => "balanced",
            QualityPreset::Quality => "quality",
        }
    }
}

impl FromStr for QualityPreset {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(QualityPreset::Fast),
            "balanced" => Ok(QualityPreset::Balanced),
            "quality" => Ok(QualityPreset::Quality),
            other => Err(SplitError::invalid_config(format!(
                "Unknown quality preset: {}. Valid presets: fast, balanced, quality",
                other
            ))),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality level carried by a selected encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Immutable split request built by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub interval_seconds: u32,
    pub total_duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub prefer_hardware: bool,
    pub parallel: bool,
    pub quality: QualityPreset,
}

impl SplitConfig {
    /// Create a config with the default prefix, hardware preferred and sequential execution
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        interval_seconds: u32,
        total_duration_ms: u64,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            file_prefix: "segment".to_string(),
            interval_seconds,
            total_duration_ms,
            width: 1920,
            height: 1080,
            prefer_hardware: true,
            parallel: false,
            quality: QualityPreset::Balanced,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_hardware(mut self, prefer_hardware: bool) -> Self {
        self.prefer_hardware = prefer_hardware;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_ms as f64 / 1000.0
    }

    /// Caller-side validation; the orchestrator only re-checks the duration
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.interval_seconds == 0 {
            return Err(SplitError::invalid_config("Interval must be greater than 0"));
        }
        if self.total_duration_ms == 0 {
            return Err(SplitError::invalid_config("Video duration must be greater than 0"));
        }
        if u64::from(self.interval_seconds) * 1000 > self.total_duration_ms {
            return Err(SplitError::invalid_config(format!(
                "Interval ({}s) exceeds video duration ({:.3}s)",
                self.interval_seconds,
                self.total_duration_seconds()
            )));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(SplitError::invalid_config("Output file prefix cannot be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SplitError::invalid_config(format!(
                "Invalid source resolution {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Output file name for a 0-based segment index
    pub fn output_file_name(&self, index: usize, total_segments: usize) -> String {
        let width = total_segments.to_string().len().max(2);
        format!("{}_{:0width$}.mp4", self.file_prefix, index + 1, width = width)
    }

    pub fn output_path(&self, index: usize, total_segments: usize) -> PathBuf {
        self.output_dir
            .join(self.output_file_name(index, total_segments))
    }
}

/// A contiguous time slice of the source, `[start, start + duration)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl Segment {
    pub fn new(index: usize, start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            index,
            start_seconds,
            duration_seconds,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    pub fn start_us(&self) -> i64 {
        (self.start_seconds * 1_000_000.0).round() as i64
    }

    pub fn end_us(&self) -> i64 {
        (self.end_seconds() * 1_000_000.0).round() as i64
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration_seconds * 1000.0).round().max(0.0) as u64
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{:.3}s - {:.3}s)",
            self.index,
            self.start_seconds,
            self.end_seconds()
        )
    }
}

/// Why a segment attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Ordinary codec or process failure
    Codec,
    /// Hardware session stopped responding (watchdog)
    Unresponsive,
}

/// Outcome of a single segment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub index: usize,
    pub success: bool,
    pub output_file: Option<PathBuf>,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub hardware_accelerated: bool,
    pub command: Option<String>,
    pub log: Option<String>,
}

impl SegmentResult {
    pub fn success(
        index: usize,
        output_file: impl Into<PathBuf>,
        hardware_accelerated: bool,
    ) -> Self {
        Self {
            index,
            success: true,
            output_file: Some(output_file.into()),
            error: None,
            failure_kind: None,
            hardware_accelerated,
            command: None,
            log: None,
        }
    }

    pub fn failure(index: usize, error: impl Into<String>, hardware_accelerated: bool) -> Self {
        Self {
            index,
            success: false,
            output_file: None,
            error: Some(error.into()),
            failure_kind: Some(FailureKind::Codec),
            hardware_accelerated,
            command: None,
            log: None,
        }
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        if !self.success {
            self.failure_kind = Some(kind);
        }
        self
    }

    pub fn with_diagnostics(mut self, command: Option<String>, log: Option<String>) -> Self {
        self.command = command;
        self.log = log;
        self
    }

    pub fn is_unresponsive(&self) -> bool {
        self.failure_kind == Some(FailureKind::Unresponsive)
    }
}

/// Diagnostics kept for every failed segment in the aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub index: usize,
    pub error: String,
    pub command: Option<String>,
    pub log_excerpt: Option<String>,
}

/// Aggregate outcome of one split run
#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    pub success: bool,
    pub output_files: Vec<PathBuf>,
    pub failed_segments: Vec<usize>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_duration_ms")]
    pub elapsed: Duration,
    pub hardware_accelerated: bool,
    pub error_message: Option<String>,
    pub failures: Vec<FailureDetail>,
    pub started_at: DateTime<Utc>,
}

impl SplitResult {
    /// Build the aggregate from the final per-index results table
    pub fn from_results(
        results: &[SegmentResult],
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let mut output_files: Vec<PathBuf> = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.output_file.clone())
            .collect();
        output_files.sort_by(|a, b| file_name_of(a).cmp(file_name_of(b)));

        let mut failed: Vec<&SegmentResult> = results.iter().filter(|r| !r.success).collect();
        failed.sort_by_key(|r| r.index);

        let failed_segments: Vec<usize> = failed.iter().map(|r| r.index).collect();
        let failures: Vec<FailureDetail> = failed
            .iter()
            .map(|r| FailureDetail {
                index: r.index,
                error: r.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
                command: r.command.clone(),
                log_excerpt: r.log.as_deref().map(|log| tail_chars(log, MAX_LOG_EXCERPT_CHARS)),
            })
            .collect();

        let error_message = if failures.is_empty() {
            None
        } else {
            Some(
                failures
                    .iter()
                    .map(|f| format!("segment {}: {}", f.index + 1, f.error))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        Self {
            success: failed_segments.is_empty(),
            output_files,
            failed_segments,
            elapsed,
            hardware_accelerated: results.iter().any(|r| r.success && r.hardware_accelerated),
            error_message,
            failures,
            started_at,
        }
    }
}

fn file_name_of(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Last `max` characters of `text`, on a char boundary
pub fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

/// First `max` characters of `text`, with an ellipsis when cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
