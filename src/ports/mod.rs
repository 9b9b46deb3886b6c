// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SmartSplitResult;

pub mod codec;

pub use codec::{
    BufferInfo, CodecError, CodecPlatform, EncoderFormat, InputSurface, MediaExtractor, Muxer,
    OutputEvent, SampleInfo, TrackFormat, VideoDecoder, VideoEncoder,
};

/// Event emitted by an external transcoder while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum TranscoderEvent {
    /// One line of the transcoder's log
    Log(String),
    /// Periodic statistics: media time processed so far
    Statistics { time_ms: u64 },
}

/// Completion of an external transcoder session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscoderCompletion {
    /// Process return code, `None` when killed by a signal
    pub return_code: Option<i32>,
    /// Full session log
    pub log: String,
    /// Session was aborted through the cancellation token
    pub cancelled: bool,
}

impl TranscoderCompletion {
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.return_code == Some(0)
    }
}

/// Port for the subprocess-style transcoder (one session per segment)
///
/// `execute` resolves once with the completion. Log lines and statistics are
/// pushed to `events` while the session runs. Cancelling `cancel` must abort the
/// session and resolve with `cancelled = true`.
#[async_trait]
pub trait TranscoderPort: Send + Sync {
    async fn execute(
        &self,
        args: Vec<String>,
        events: mpsc::UnboundedSender<TranscoderEvent>,
        cancel: CancellationToken,
    ) -> SmartSplitResult<TranscoderCompletion>;

    /// Program name used when rendering diagnostics
    fn program(&self) -> String {
        "ffmpeg".to_string()
    }
}

/// Bitrate-control modes an encoder advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitrateMode {
    Cbr,
    Vbr,
    Cq,
}

/// One entry of the platform codec registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub is_encoder: bool,
    /// Codec families handled, e.g. `h264`, `hevc`
    pub codec_types: Vec<String>,
    /// Platform-reported acceleration flag, when the platform exposes one
    pub hardware_accelerated: Option<bool>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub bitrate_modes: Vec<BitrateMode>,
}

impl CodecDescriptor {
    pub fn encoder(name: impl Into<String>, codec_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_encoder: true,
            codec_types: vec![codec_type.into()],
            hardware_accelerated: None,
            max_width: None,
            max_height: None,
            bitrate_modes: Vec::new(),
        }
    }

    pub fn handles(&self, codec_type: &str) -> bool {
        self.codec_types.iter().any(|t| t.eq_ignore_ascii_case(codec_type))
    }
}

/// Port for enumerating registered codecs
#[async_trait]
pub trait CodecRegistryPort: Send + Sync {
    async fn enumerate(&self) -> SmartSplitResult<Vec<CodecDescriptor>>;
}

/// Port for announcing finished files to a media index
#[async_trait]
pub trait MediaIndexPort: Send + Sync {
    async fn notify(&self, path: &Path, mime_type: &str) -> SmartSplitResult<()>;
}

/// Source properties the caller needs to build a split config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Port for caller-side media probing
#[async_trait]
pub trait MediaProbePort: Send + Sync {
    async fn probe(&self, path: &Path) -> SmartSplitResult<MediaSummary>;
}
