//! Progress reporting for split runs

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Engine-level progress sink, percent of the current segment (0-100)
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// A sink that drops every update
pub fn silent_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// Progress snapshot delivered to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitProgress {
    /// 0-based index of the segment being reported
    pub segment_index: usize,
    pub total_segments: usize,
    /// Progress of that segment (0-100)
    pub segment_percent: f32,
    /// Progress of the whole run (0-100)
    pub overall_percent: f32,
    pub status: String,
}

impl SplitProgress {
    /// Snapshot for sequential runs, where earlier segments are complete
    pub fn sequential(
        segment_index: usize,
        total_segments: usize,
        segment_percent: f32,
        status: impl Into<String>,
    ) -> Self {
        let segment_percent = segment_percent.clamp(0.0, 100.0);
        let overall_percent = if total_segments == 0 {
            0.0
        } else {
            let done = segment_index as f32 + segment_percent / 100.0;
            (done / total_segments as f32 * 100.0).min(100.0)
        };
        Self {
            segment_index,
            total_segments,
            segment_percent,
            overall_percent,
            status: status.into(),
        }
    }

    /// Snapshot for the retry pass; every segment was attempted, so overall stays at 100
    pub fn retrying(
        segment_index: usize,
        total_segments: usize,
        segment_percent: f32,
        status: impl Into<String>,
    ) -> Self {
        Self {
            segment_index,
            total_segments,
            segment_percent: segment_percent.clamp(0.0, 100.0),
            overall_percent: 100.0,
            status: status.into(),
        }
    }
}

/// Progress callback for UI integration
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &SplitProgress);
}

impl<F> ProgressCallback for F
where
    F: Fn(&SplitProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &SplitProgress) {
        self(progress)
    }
}

/// Console progress callback for CLI usage
pub struct ConsoleProgressCallback {
    verbose: bool,
}

impl ConsoleProgressCallback {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn render_bar(percent: f32) -> String {
        let bar_length = 20;
        let filled = ((percent / 100.0) * bar_length as f32).round() as usize;
        let filled = filled.min(bar_length);
        "#".repeat(filled) + &"-".repeat(bar_length - filled)
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, progress: &SplitProgress) {
        let bar = Self::render_bar(progress.overall_percent);
        if self.verbose {
            eprintln!(
                "[{}] {:>5.1}% segment {}/{} {:>5.1}% {}",
                bar,
                progress.overall_percent,
                progress.segment_index + 1,
                progress.total_segments,
                progress.segment_percent,
                progress.status
            );
        } else {
            eprint!("\r[{}] {:>5.1}% {}", bar, progress.overall_percent, progress.status);
        }
    }
}

/// JSON-lines progress callback for structured output
pub struct JsonProgressCallback;

impl ProgressCallback for JsonProgressCallback {
    fn on_progress(&self, progress: &SplitProgress) {
        let event = serde_json::json!({
            "event": "progress",
            "segment": progress.segment_index + 1,
            "total_segments": progress.total_segments,
            "segment_percent": progress.segment_percent,
            "overall_percent": progress.overall_percent,
            "status": progress.status,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        println!("{}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sequential_overall_percent() {
        let p = SplitProgress::sequential(1, 4, 50.0, "working");
        assert_eq!(p.overall_percent, 37.5);

        let done = SplitProgress::sequential(3, 4, 100.0, "done");
        assert_eq!(done.overall_percent, 100.0);

        let clamped = SplitProgress::sequential(0, 2, 250.0, "");
        assert_eq!(clamped.segment_percent, 100.0);
        assert_eq!(clamped.overall_percent, 50.0);

        assert_eq!(SplitProgress::sequential(0, 0, 10.0, "").overall_percent, 0.0);
    }

    #[test]
    fn test_retry_snapshot_keeps_overall_complete() {
        let first = SplitProgress::retrying(0, 4, 0.0, "Retrying segment 1/4");
        assert_eq!(first.overall_percent, 100.0);
        assert_eq!(first.segment_percent, 0.0);

        let half = SplitProgress::retrying(2, 4, 50.0, "");
        assert_eq!(half.overall_percent, 100.0);
        assert_eq!(half.segment_percent, 50.0);
    }

    #[test]
    fn test_closure_callback() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: &SplitProgress| seen.lock().unwrap().push(p.segment_index);
        callback.on_progress(&SplitProgress::sequential(2, 3, 0.0, ""));
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_render_bar_bounds() {
        assert_eq!(ConsoleProgressCallback::render_bar(0.0), "-".repeat(20));
        assert_eq!(ConsoleProgressCallback::render_bar(100.0), "#".repeat(20));
        assert_eq!(ConsoleProgressCallback::render_bar(150.0), "#".repeat(20));
    }
}
