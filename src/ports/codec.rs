// Platform codec primitives hosting the native engine
//
// Any platform that can enumerate and introspect tracks, seek to sync points,
// pull compressed samples, couple a decoder to an encoder input surface and
// multiplex a container can implement these traits.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Error raised by a platform codec primitive
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("{0}")]
    Platform(String),

    #[error("codec is in an illegal state: {0}")]
    IllegalState(String),

    #[error("unsupported format: {0}")]
    Unsupported(String),
}

impl CodecError {
    pub fn platform(message: impl Into<String>) -> Self {
        CodecError::Platform(message.into())
    }
}

/// Track format as reported by the extractor or a codec
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackFormat {
    pub mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bit_rate: Option<u32>,
    pub frame_rate: Option<f32>,
    pub duration_us: Option<i64>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u32>,
}

impl TrackFormat {
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn audio(mime: impl Into<String>, sample_rate: u32, channel_count: u32) -> Self {
        Self {
            mime: mime.into(),
            sample_rate: Some(sample_rate),
            channel_count: Some(channel_count),
            ..Default::default()
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }
}

/// Encoder configuration handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderFormat {
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u32,
    pub frame_rate: f32,
    /// Seconds between keyframes; 0 makes every frame a keyframe
    pub i_frame_interval: u32,
}

/// A compressed sample read from the extractor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleInfo {
    pub size: usize,
    pub presentation_time_us: i64,
    pub key_frame: bool,
}

/// Metadata of a codec output buffer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BufferInfo {
    pub size: usize,
    pub presentation_time_us: i64,
    pub key_frame: bool,
    pub codec_config: bool,
    pub end_of_stream: bool,
}

/// Result of polling a codec's output queue
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Buffer { index: usize, info: BufferInfo },
    FormatChanged(TrackFormat),
    TryAgainLater,
}

/// Container demuxer with pull-based sample reads
pub trait MediaExtractor: Send {
    fn track_count(&self) -> usize;
    fn track_format(&self, track: usize) -> Result<TrackFormat, CodecError>;
    fn select_track(&mut self, track: usize) -> Result<(), CodecError>;
    /// Seek to the nearest sync sample at or before `time_us`
    fn seek_to_previous_sync(&mut self, time_us: i64) -> Result<(), CodecError>;
    /// Copy the current sample into `buf` and advance; `None` at end of stream
    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<SampleInfo>, CodecError>;
    fn release(&mut self) -> Result<(), CodecError>;
}

/// Surface produced by the encoder that a decoder renders into
pub trait InputSurface: Send {
    fn release(&mut self) -> Result<(), CodecError>;
}

/// Decoder configured to render into an encoder input surface
pub trait VideoDecoder: Send {
    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Result<Option<usize>, CodecError>;
    fn queue_input_buffer(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: i64,
        end_of_stream: bool,
    ) -> Result<(), CodecError>;
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputEvent, CodecError>;
    /// Return an output buffer; `render` pushes the frame to the surface
    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<(), CodecError>;
    fn stop(&mut self) -> Result<(), CodecError>;
    fn release(&mut self) -> Result<(), CodecError>;
}

/// Hardware encoder fed through its input surface
pub trait VideoEncoder: Send {
    fn signal_end_of_input_stream(&mut self) -> Result<(), CodecError>;
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputEvent, CodecError>;
    fn output_buffer(&mut self, index: usize) -> Result<Vec<u8>, CodecError>;
    fn release_output_buffer(&mut self, index: usize) -> Result<(), CodecError>;
    fn stop(&mut self) -> Result<(), CodecError>;
    fn release(&mut self) -> Result<(), CodecError>;
}

/// MPEG-4 container writer
pub trait Muxer: Send {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, CodecError>;
    fn start(&mut self) -> Result<(), CodecError>;
    fn write_sample(
        &mut self,
        track: usize,
        data: &[u8],
        info: &BufferInfo,
    ) -> Result<(), CodecError>;
    fn stop(&mut self) -> Result<(), CodecError>;
    fn release(&mut self) -> Result<(), CodecError>;
}

/// Factory for the platform primitives
pub trait CodecPlatform: Send + Sync {
    fn open_extractor(&self, path: &Path) -> Result<Box<dyn MediaExtractor>, CodecError>;
    fn create_encoder(
        &self,
        format: &EncoderFormat,
    ) -> Result<(Box<dyn VideoEncoder>, Box<dyn InputSurface>), CodecError>;
    fn create_decoder(
        &self,
        format: &TrackFormat,
        surface: &dyn InputSurface,
    ) -> Result<Box<dyn VideoDecoder>, CodecError>;
    fn create_muxer(&self, path: &Path) -> Result<Box<dyn Muxer>, CodecError>;
}
