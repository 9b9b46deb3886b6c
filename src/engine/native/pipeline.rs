// Decode -> surface -> encode -> mux state machine for one segment
//
// Runs on a blocking thread. Every codec call has a short timeout so the
// loop can observe cancellation and the watchdog between calls.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::watchdog::{Watchdog, WatchdogLimits};
use crate::engine::{ProgressSink, SegmentJob};
use crate::error::{SmartSplitResult, SplitError};
use crate::ports::codec::{
    BufferInfo, CodecError, CodecPlatform, EncoderFormat, InputSurface, MediaExtractor, Muxer,
    OutputEvent, TrackFormat, VideoDecoder, VideoEncoder,
};

pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(10);
pub const OUTPUT_VIDEO_MIME: &str = "video/avc";
pub const DEFAULT_BIT_RATE: u32 = 8_000_000;
pub const MAX_BIT_RATE: u32 = 20_000_000;
pub const DEFAULT_FRAME_RATE: f32 = 30.0;
const DIMENSION_ALIGNMENT: u32 = 16;

/// Position of the pull loop within one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Feeding,
    DrainingDecoder,
    DrainingEncoder,
    Done,
}

/// Microsecond window of the segment, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    pub start_us: i64,
    pub end_us: i64,
}

impl SegmentWindow {
    pub fn contains(&self, pts: i64) -> bool {
        pts >= self.start_us && pts < self.end_us
    }

    pub fn rebase(&self, pts: i64) -> i64 {
        (pts - self.start_us).max(0)
    }

    pub fn percent(&self, pts: i64) -> f32 {
        let span = (self.end_us - self.start_us).max(1) as f64;
        ((pts - self.start_us) as f64 / span * 100.0).clamp(0.0, 100.0) as f32
    }
}

/// Platform resources owned by one run, torn down in a fixed order
#[derive(Default)]
pub struct CodecSession {
    extractor: Option<Box<dyn MediaExtractor>>,
    decoder: Option<Box<dyn VideoDecoder>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    surface: Option<Box<dyn InputSurface>>,
    muxer: Option<Box<dyn Muxer>>,
    muxer_started: bool,
}

impl CodecSession {
    /// Decoder, encoder, surface, muxer, extractor. A failing step never skips the rest.
    pub fn teardown(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            guarded("stop decoder", decoder.stop());
            guarded("release decoder", decoder.release());
        }
        if let Some(mut encoder) = self.encoder.take() {
            guarded("stop encoder", encoder.stop());
            guarded("release encoder", encoder.release());
        }
        if let Some(mut surface) = self.surface.take() {
            guarded("release input surface", surface.release());
        }
        if let Some(mut muxer) = self.muxer.take() {
            if self.muxer_started {
                guarded("stop muxer", muxer.stop());
                self.muxer_started = false;
            }
            guarded("release muxer", muxer.release());
        }
        if let Some(mut extractor) = self.extractor.take() {
            guarded("release extractor", extractor.release());
        }
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn guarded(step: &str, result: Result<(), CodecError>) {
    if let Err(e) = result {
        warn!("Failed to {} during teardown: {}", step, e);
    }
}

/// Encoder settings derived from the source video track
pub fn encoder_format_for(source: &TrackFormat) -> SmartSplitResult<EncoderFormat> {
    let (Some(width), Some(height)) = (source.width, source.height) else {
        return Err(native_error("Video track has no dimensions"));
    };
    let aligned_width = width & !(DIMENSION_ALIGNMENT - 1);
    let aligned_height = height & !(DIMENSION_ALIGNMENT - 1);
    if aligned_width == 0 || aligned_height == 0 {
        return Err(native_error(format!(
            "Video resolution {}x{} is too small for the hardware encoder",
            width, height
        )));
    }

    Ok(EncoderFormat {
        mime: OUTPUT_VIDEO_MIME.to_string(),
        width: aligned_width,
        height: aligned_height,
        bit_rate: source.bit_rate.unwrap_or(DEFAULT_BIT_RATE).min(MAX_BIT_RATE),
        frame_rate: source
            .frame_rate
            .filter(|rate| *rate > 0.0)
            .unwrap_or(DEFAULT_FRAME_RATE),
        i_frame_interval: 0,
    })
}

fn native_error(message: impl Into<String>) -> SplitError {
    SplitError::Engine {
        engine: "native".to_string(),
        message: message.into(),
    }
}

fn find_track(
    extractor: &dyn MediaExtractor,
    wanted: fn(&TrackFormat) -> bool,
) -> SmartSplitResult<Option<(usize, TrackFormat)>> {
    for track in 0..extractor.track_count() {
        let format = extractor.track_format(track)?;
        if wanted(&format) {
            return Ok(Some((track, format)));
        }
    }
    Ok(None)
}

/// Produce one segment file; the caller owns partial-output cleanup
pub fn run_segment(
    platform: &dyn CodecPlatform,
    job: &SegmentJob,
    limits: WatchdogLimits,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> SmartSplitResult<()> {
    let mut session = CodecSession::default();
    let outcome = execute(platform, job, limits, progress, cancel, &mut session);
    session.teardown();
    outcome
}

fn execute(
    platform: &dyn CodecPlatform,
    job: &SegmentJob,
    limits: WatchdogLimits,
    progress: &ProgressSink,
    cancel: &CancellationToken,
    session: &mut CodecSession,
) -> SmartSplitResult<()> {
    let window = SegmentWindow {
        start_us: job.segment.start_us(),
        end_us: job.segment.end_us(),
    };

    let extractor = platform.open_extractor(&job.input_path)?;
    let video = find_track(extractor.as_ref(), TrackFormat::is_video);
    let audio = find_track(extractor.as_ref(), TrackFormat::is_audio);
    session.extractor = Some(extractor);
    let Some((video_track, video_format)) = video? else {
        return Err(native_error(format!(
            "No video track found in {}",
            job.input_path.display()
        )));
    };
    let audio = audio?;

    let encoder_format = encoder_format_for(&video_format)?;
    debug!(
        segment = job.segment.index,
        width = encoder_format.width,
        height = encoder_format.height,
        bit_rate = encoder_format.bit_rate,
        "Configuring hardware encoder"
    );

    let (encoder, surface) = platform.create_encoder(&encoder_format)?;
    session.encoder = Some(encoder);
    session.surface = Some(surface);
    let decoder = match session.surface.as_deref() {
        Some(surface) => platform.create_decoder(&video_format, surface)?,
        None => return Err(native_error("Encoder input surface missing")),
    };
    session.decoder = Some(decoder);
    session.muxer = Some(platform.create_muxer(&job.output_file)?);

    let (Some(extractor), Some(decoder), Some(encoder), Some(muxer)) = (
        session.extractor.as_mut(),
        session.decoder.as_mut(),
        session.encoder.as_mut(),
        session.muxer.as_mut(),
    ) else {
        return Err(native_error("Codec session incomplete"));
    };

    extractor.select_track(video_track)?;
    extractor.seek_to_previous_sync(window.start_us)?;

    let mut pipeline = VideoPipeline {
        extractor,
        decoder,
        encoder,
        muxer,
        muxer_started: &mut session.muxer_started,
        window,
        audio_format: audio.as_ref().map(|(_, format)| format.clone()),
        video_out_track: None,
        audio_out_track: None,
        state: PipelineState::Feeding,
        input_done: false,
        decoder_done: false,
        encoder_done: false,
        last_input_pts: window.start_us,
        video_samples: 0,
        buffer: Vec::new(),
    };
    pipeline.run(limits, progress, cancel)?;

    let video_samples = pipeline.video_samples;
    let audio_out_track = pipeline.audio_out_track;
    if video_samples == 0 {
        return Err(native_error(format!(
            "No video frames encoded for segment {}",
            job.segment
        )));
    }

    if let (Some((source_track, _)), Some(out_track)) = (audio, audio_out_track) {
        if let Some(muxer) = session.muxer.as_mut() {
            let copied = copy_audio(
                platform,
                job,
                source_track,
                muxer.as_mut(),
                out_track,
                window,
                cancel,
            )?;
            debug!(segment = job.segment.index, samples = copied, "Audio passthrough complete");
        }
    }

    if let Some(muxer) = session.muxer.as_mut() {
        session.muxer_started = false;
        muxer.stop()?;
    }
    progress(100.0);
    Ok(())
}

struct VideoPipeline<'a> {
    extractor: &'a mut Box<dyn MediaExtractor>,
    decoder: &'a mut Box<dyn VideoDecoder>,
    encoder: &'a mut Box<dyn VideoEncoder>,
    muxer: &'a mut Box<dyn Muxer>,
    muxer_started: &'a mut bool,
    window: SegmentWindow,
    audio_format: Option<TrackFormat>,
    video_out_track: Option<usize>,
    audio_out_track: Option<usize>,
    state: PipelineState,
    input_done: bool,
    decoder_done: bool,
    encoder_done: bool,
    last_input_pts: i64,
    video_samples: u64,
    buffer: Vec<u8>,
}

impl VideoPipeline<'_> {
    fn run(
        &mut self,
        limits: WatchdogLimits,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> SmartSplitResult<()> {
        let mut watchdog = Watchdog::start(limits);
        let mut reported = -1.0_f32;

        while self.state != PipelineState::Done {
            if cancel.is_cancelled() {
                return Err(SplitError::Cancelled);
            }

            let progressed = self.cycle()?;
            if self.state == PipelineState::Done {
                break;
            }
            watchdog.check(progressed).map_err(|trip| SplitError::Watchdog {
                message: trip.to_string(),
            })?;

            let percent = self.window.percent(self.last_input_pts).floor();
            if percent > reported {
                reported = percent;
                progress(percent);
            }
        }
        Ok(())
    }

    /// One pass through feed, decoder drain and encoder drain
    fn cycle(&mut self) -> SmartSplitResult<bool> {
        let mut progressed = false;
        loop {
            let (step, next) = match self.state {
                PipelineState::Feeding => (self.feed_decoder()?, PipelineState::DrainingDecoder),
                PipelineState::DrainingDecoder => {
                    (self.drain_decoder()?, PipelineState::DrainingEncoder)
                }
                PipelineState::DrainingEncoder => {
                    let step = self.drain_encoder()?;
                    let next = if self.encoder_done {
                        PipelineState::Done
                    } else {
                        PipelineState::Feeding
                    };
                    (step, next)
                }
                PipelineState::Done => return Ok(progressed),
            };
            progressed |= step;
            self.state = next;
            if matches!(next, PipelineState::Feeding | PipelineState::Done) {
                return Ok(progressed);
            }
        }
    }

    fn feed_decoder(&mut self) -> SmartSplitResult<bool> {
        if self.input_done {
            return Ok(false);
        }
        let Some(index) = self.decoder.dequeue_input_buffer(DEQUEUE_TIMEOUT)? else {
            return Ok(false);
        };

        match self.extractor.read_sample(&mut self.buffer)? {
            // Reordered frames inside the window can follow a later pts in decode
            // order, so feeding runs on to the next sync sample past the end
            Some(sample)
                if sample.presentation_time_us < self.window.end_us || !sample.key_frame =>
            {
                let size = sample.size.min(self.buffer.len());
                self.decoder.queue_input_buffer(
                    index,
                    &self.buffer[..size],
                    sample.presentation_time_us,
                    false,
                )?;
                self.last_input_pts = sample.presentation_time_us;
            }
            _ => {
                trace!("Queueing decoder end of stream");
                self.decoder.queue_input_buffer(index, &[], 0, true)?;
                self.input_done = true;
            }
        }
        Ok(true)
    }

    fn drain_decoder(&mut self) -> SmartSplitResult<bool> {
        if self.decoder_done {
            return Ok(false);
        }
        match self.decoder.dequeue_output_buffer(DEQUEUE_TIMEOUT)? {
            OutputEvent::TryAgainLater => Ok(false),
            OutputEvent::FormatChanged(format) => {
                debug!("Decoder output format changed to {}", format.mime);
                Ok(true)
            }
            OutputEvent::Buffer { index, info } => {
                // Frames decoded from the sync point before the start are dropped
                let render = !info.end_of_stream && self.window.contains(info.presentation_time_us);
                self.decoder.release_output_buffer(index, render)?;
                if info.end_of_stream {
                    self.encoder.signal_end_of_input_stream()?;
                    self.decoder_done = true;
                }
                Ok(true)
            }
        }
    }

    fn drain_encoder(&mut self) -> SmartSplitResult<bool> {
        let mut progressed = false;
        loop {
            match self.encoder.dequeue_output_buffer(DEQUEUE_TIMEOUT)? {
                OutputEvent::TryAgainLater => return Ok(progressed),
                OutputEvent::FormatChanged(format) => {
                    self.start_muxer(&format)?;
                    progressed = true;
                }
                OutputEvent::Buffer { index, info } => {
                    progressed = true;
                    if info.size > 0 && !info.codec_config {
                        self.write_video(index, info)?;
                    }
                    self.encoder.release_output_buffer(index)?;
                    if info.end_of_stream {
                        self.encoder_done = true;
                        return Ok(progressed);
                    }
                }
            }
        }
    }

    fn start_muxer(&mut self, video_format: &TrackFormat) -> SmartSplitResult<()> {
        if *self.muxer_started {
            return Err(CodecError::IllegalState(
                "encoder output format changed twice".to_string(),
            )
            .into());
        }
        self.video_out_track = Some(self.muxer.add_track(video_format)?);
        if let Some(audio_format) = &self.audio_format {
            self.audio_out_track = Some(self.muxer.add_track(audio_format)?);
        }
        self.muxer.start()?;
        *self.muxer_started = true;
        debug!(
            video_track = ?self.video_out_track,
            audio_track = ?self.audio_out_track,
            "Muxer started"
        );
        Ok(())
    }

    fn write_video(&mut self, index: usize, info: BufferInfo) -> SmartSplitResult<()> {
        let Some(track) = self.video_out_track.filter(|_| *self.muxer_started) else {
            return Err(CodecError::IllegalState(
                "encoder produced output before its format".to_string(),
            )
            .into());
        };
        let data = self.encoder.output_buffer(index)?;
        let rebased = BufferInfo {
            presentation_time_us: self.window.rebase(info.presentation_time_us),
            ..info
        };
        let size = info.size.min(data.len());
        self.muxer.write_sample(track, &data[..size], &rebased)?;
        self.video_samples += 1;
        Ok(())
    }
}

/// Copy the audio samples of the window without re-encoding
fn copy_audio(
    platform: &dyn CodecPlatform,
    job: &SegmentJob,
    source_track: usize,
    muxer: &mut dyn Muxer,
    out_track: usize,
    window: SegmentWindow,
    cancel: &CancellationToken,
) -> SmartSplitResult<u64> {
    let mut extractor = platform.open_extractor(&job.input_path)?;
    let copied = pump_audio(extractor.as_mut(), source_track, muxer, out_track, window, cancel);
    guarded("release audio extractor", extractor.release());
    copied
}

fn pump_audio(
    extractor: &mut dyn MediaExtractor,
    source_track: usize,
    muxer: &mut dyn Muxer,
    out_track: usize,
    window: SegmentWindow,
    cancel: &CancellationToken,
) -> SmartSplitResult<u64> {
    extractor.select_track(source_track)?;
    extractor.seek_to_previous_sync(window.start_us)?;

    let mut buffer = Vec::new();
    let mut copied = 0;
    while let Some(sample) = extractor.read_sample(&mut buffer)? {
        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }
        if sample.presentation_time_us >= window.end_us {
            break;
        }
        if sample.presentation_time_us < window.start_us {
            continue;
        }
        let info = BufferInfo {
            size: sample.size,
            presentation_time_us: window.rebase(sample.presentation_time_us),
            key_frame: sample.key_frame,
            codec_config: false,
            end_of_stream: false,
        };
        let size = sample.size.min(buffer.len());
        muxer.write_sample(out_track, &buffer[..size], &info)?;
        copied += 1;
    }
    Ok(copied)
}
