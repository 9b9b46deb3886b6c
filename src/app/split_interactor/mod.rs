// Split interactor - Orchestrates the segment split use case

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::model::{Segment, SegmentResult, SplitConfig, SplitResult, OUTPUT_MIME_TYPE};
use crate::engine::{
    discard_partial_output, EncoderConfig, EncoderConfigFactory, ProgressCallback, ProgressSink,
    SegmentJob, SegmentTranscodeEngine, SplitProgress,
};
use crate::error::{SmartSplitResult, SplitError};
use crate::planner::SegmentPlanner;
use crate::ports::MediaIndexPort;


/// Worker pool size for parallel runs: half the CPUs, at least two
pub fn default_parallelism() -> usize {
    (num_cpus::get() / 2).max(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Observable state of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SplitState {
    Idle,
    Planning,
    Running(ExecutionMode),
    Retrying,
    Completed,
    Cancelled,
}

impl fmt::Display for SplitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitState::Idle => f.write_str("idle"),
            SplitState::Planning => f.write_str("planning"),
            SplitState::Running(ExecutionMode::Sequential) => f.write_str("running (sequential)"),
            SplitState::Running(ExecutionMode::Parallel) => f.write_str("running (parallel)"),
            SplitState::Retrying => f.write_str("retrying"),
            SplitState::Completed => f.write_str("completed"),
            SplitState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Per-run inputs shared by every segment dispatch
struct RunContext<'a> {
    config: &'a SplitConfig,
    total: usize,
    progress: &'a Arc<dyn ProgressCallback>,
    cancel: &'a CancellationToken,
}

impl RunContext<'_> {
    fn job(&self, segment: Segment, encoder: &EncoderConfig) -> SegmentJob {
        SegmentJob {
            input_path: self.config.input_path.clone(),
            segment,
            encoder: encoder.clone(),
            output_file: self.config.output_path(segment.index, self.total),
        }
    }

    fn sink(&self, index: usize, pass: Pass) -> ProgressSink {
        let callback = Arc::clone(self.progress);
        let total = self.total;
        let status = format!("{} segment {}/{}", pass.verb(), index + 1, total);
        Arc::new(move |percent| {
            let snapshot = match pass {
                Pass::Initial => SplitProgress::sequential(index, total, percent, status.clone()),
                Pass::Retry => SplitProgress::retrying(index, total, percent, status.clone()),
            };
            callback.on_progress(&snapshot)
        })
    }
}

/// Which sequential pass a dispatch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Initial,
    Retry,
}

impl Pass {
    fn verb(self) -> &'static str {
        match self {
            Pass::Initial => "Processing",
            Pass::Retry => "Retrying",
        }
    }
}

/// Top-level split state machine
pub struct SplitOrchestrator {
    factory: EncoderConfigFactory,
    hardware_engine: Arc<dyn SegmentTranscodeEngine>,
    software_engine: Arc<dyn SegmentTranscodeEngine>,
    media_index: Arc<dyn MediaIndexPort>,
    failure_threshold: u32,
    max_parallel: usize,
    state: watch::Sender<SplitState>,
}

impl SplitOrchestrator {
    pub fn new(
        factory: EncoderConfigFactory,
        hardware_engine: Arc<dyn SegmentTranscodeEngine>,
        software_engine: Arc<dyn SegmentTranscodeEngine>,
        media_index: Arc<dyn MediaIndexPort>,
    ) -> Self {
        let (state, _) = watch::channel(SplitState::Idle);
        Self {
            factory,
            hardware_engine,
            software_engine,
            media_index,
            failure_threshold: 1,
            max_parallel: default_parallelism(),
            state,
        }
    }

    /// Consecutive hardware failures tolerated before switching to software (minimum 1)
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn state(&self) -> SplitState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SplitState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SplitState) {
        let previous = self.state.send_replace(next);
        debug!("Orchestrator state {} -> {}", previous, next);
    }

    fn engine_for(&self, encoder: &EncoderConfig) -> Arc<dyn SegmentTranscodeEngine> {
        if encoder.hardware_accelerated {
            Arc::clone(&self.hardware_engine)
        } else {
            Arc::clone(&self.software_engine)
        }
    }

    /// Split the input into one file per planned segment
    ///
    /// Returns `Err(SplitError::Cancelled)` when `cancel` fires; segment
    /// failures are reported inside the [`SplitResult`].
    pub async fn split(
        &self,
        config: &SplitConfig,
        progress: Arc<dyn ProgressCallback>,
        cancel: CancellationToken,
    ) -> SmartSplitResult<SplitResult> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = self.run(config, &progress, &cancel).await;
        match &outcome {
            Ok(_) => self.transition(SplitState::Completed),
            Err(e) if e.is_cancelled() => {
                info!("Split cancelled");
                self.transition(SplitState::Cancelled);
            }
            Err(e) => {
                error!("Split aborted: {}", e);
                self.transition(SplitState::Idle);
            }
        }
        let results = outcome?;

        for result in results.iter().filter(|r| r.success) {
            if let Some(path) = &result.output_file {
                if let Err(e) = self.media_index.notify(path, OUTPUT_MIME_TYPE).await {
                    warn!("Media index notification failed for {}: {}", path.display(), e);
                }
            }
        }

        let aggregate = SplitResult::from_results(&results, started_at, clock.elapsed());
        info!(
            outputs = aggregate.output_files.len(),
            failed = aggregate.failed_segments.len(),
            hardware = aggregate.hardware_accelerated,
            elapsed_ms = aggregate.elapsed.as_millis() as u64,
            "Split finished"
        );
        Ok(aggregate)
    }

    async fn run(
        &self,
        config: &SplitConfig,
        progress: &Arc<dyn ProgressCallback>,
        cancel: &CancellationToken,
    ) -> SmartSplitResult<Vec<SegmentResult>> {
        if config.total_duration_ms == 0 {
            return Err(SplitError::invalid_config("Video duration must be greater than 0"));
        }

        self.transition(SplitState::Planning);
        let encoder = self
            .factory
            .best_config(config.prefer_hardware, config.width, config.height, config.quality)
            .await;
        info!("Selected encoder: {}", encoder.description);

        let segments =
            SegmentPlanner::plan(config.total_duration_seconds(), config.interval_seconds);
        if segments.is_empty() {
            return Err(SplitError::EmptyPlan {
                duration_seconds: config.total_duration_seconds(),
            });
        }
        info!(
            "Planned {} segments of up to {}s",
            segments.len(),
            config.interval_seconds
        );

        tokio::fs::create_dir_all(&config.output_dir).await?;

        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let ctx = RunContext {
            config,
            total: segments.len(),
            progress,
            cancel,
        };

        if config.parallel && segments.len() > 1 {
            self.transition(SplitState::Running(ExecutionMode::Parallel));
            self.run_parallel(&ctx, &segments, encoder).await
        } else {
            self.transition(SplitState::Running(ExecutionMode::Sequential));
            self.run_sequential(&ctx, &segments, encoder).await
        }
    }

    async fn dispatch(
        &self,
        ctx: &RunContext<'_>,
        segment: Segment,
        encoder: &EncoderConfig,
        pass: Pass,
    ) -> SmartSplitResult<SegmentResult> {
        let engine = self.engine_for(encoder);
        let sink = ctx.sink(segment.index, pass);
        sink(0.0);
        debug!(segment = segment.index, engine = engine.name(), "Dispatching {}", segment);

        let result = match engine
            .transcode(ctx.job(segment, encoder), sink, ctx.cancel.clone())
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                SegmentResult::failure(segment.index, e.to_string(), encoder.hardware_accelerated)
            }
        };

        // A result finished under cancellation is discarded
        if ctx.cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }
        Ok(result)
    }

    async fn run_sequential(
        &self,
        ctx: &RunContext<'_>,
        segments: &[Segment],
        initial: EncoderConfig,
    ) -> SmartSplitResult<Vec<SegmentResult>> {
        let software = self.factory.software_config(ctx.config.quality);
        let mut encoder = initial;
        let mut hardware_failures = 0u32;
        let mut retry_queue = Vec::new();
        let mut results = Vec::with_capacity(segments.len());

        for segment in segments {
            if ctx.cancel.is_cancelled() {
                return Err(SplitError::Cancelled);
            }

            let result = self.dispatch(ctx, *segment, &encoder, Pass::Initial).await?;
            if result.success {
                if encoder.hardware_accelerated {
                    hardware_failures = 0;
                }
            } else if encoder.hardware_accelerated {
                hardware_failures += 1;
                retry_queue.push(segment.index);
                warn!(
                    segment = segment.index,
                    unresponsive = result.is_unresponsive(),
                    failures = hardware_failures,
                    "Hardware segment failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
                if hardware_failures >= self.failure_threshold {
                    warn!(
                        "{} consecutive hardware failures, switching to software encoding",
                        hardware_failures
                    );
                    encoder = software.clone();
                }
            } else {
                warn!(
                    segment = segment.index,
                    "Software segment failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        if retry_queue.is_empty() {
            return Ok(results);
        }

        self.transition(SplitState::Retrying);
        info!("Retrying {} segments with software encoding", retry_queue.len());
        for index in retry_queue {
            if ctx.cancel.is_cancelled() {
                return Err(SplitError::Cancelled);
            }
            let Some(segment) = segments.iter().find(|s| s.index == index).copied() else {
                continue;
            };
            discard_partial_output(&ctx.config.output_path(index, ctx.total)).await;

            let retried = self.dispatch(ctx, segment, &software, Pass::Retry).await?;
            info!(segment = index, success = retried.success, "Retry finished");
            if let Some(slot) = results.iter_mut().find(|r| r.index == index) {
                *slot = retried;
            }
        }
        Ok(results)
    }

    /// Bounded-parallel run with one fixed encoder config and no fallback
    async fn run_parallel(
        &self,
        ctx: &RunContext<'_>,
        segments: &[Segment],
        encoder: EncoderConfig,
    ) -> SmartSplitResult<Vec<SegmentResult>> {
        let total = ctx.total;
        let gate = Arc::new(Semaphore::new(self.max_parallel));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();
        info!("Running {} segments with up to {} workers", total, self.max_parallel);

        for segment in segments.iter().copied() {
            let engine = self.engine_for(&encoder);
            let job = ctx.job(segment, &encoder);
            let hardware = encoder.hardware_accelerated;
            let gate = Arc::clone(&gate);
            let completed = Arc::clone(&completed);
            let callback = Arc::clone(ctx.progress);
            let cancel = ctx.cancel.clone();

            workers.spawn(async move {
                let _permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|_| SplitError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(SplitError::Cancelled);
                }

                let done = completed.load(Ordering::SeqCst);
                callback.on_progress(&SplitProgress {
                    segment_index: segment.index,
                    total_segments: total,
                    segment_percent: 0.0,
                    overall_percent: done as f32 / total as f32 * 100.0,
                    status: format!("Started segment {}/{}", segment.index + 1, total),
                });

                let result = match engine
                    .transcode(job, crate::engine::progress::silent_sink(), cancel)
                    .await
                {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => SegmentResult::failure(segment.index, e.to_string(), hardware),
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                callback.on_progress(&SplitProgress {
                    segment_index: segment.index,
                    total_segments: total,
                    segment_percent: 100.0,
                    overall_percent: done as f32 / total as f32 * 100.0,
                    status: format!("Completed {}/{} segments", done, total),
                });
                Ok(result)
            });
        }

        let mut table: Vec<Option<SegmentResult>> = vec![None; total];
        let mut cancelled = false;
        // Every worker shares the token, so draining lets each engine clean up its partial output
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(result)) => {
                    let index = result.index;
                    match table.get_mut(index) {
                        Some(slot) => *slot = Some(result),
                        None => warn!(segment = index, "Result for unplanned segment ignored"),
                    }
                }
                Ok(Err(e)) if e.is_cancelled() => cancelled = true,
                Ok(Err(e)) => warn!("Segment worker failed: {}", e),
                Err(e) => error!("Segment worker aborted: {}", e),
            }
        }

        if cancelled || ctx.cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        Ok(table
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    SegmentResult::failure(
                        index,
                        "Segment worker aborted",
                        encoder.hardware_accelerated,
                    )
                })
            })
            .collect())
    }
}
