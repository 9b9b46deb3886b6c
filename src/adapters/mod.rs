// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod media_index_log;
pub mod probe_ffprobe;
pub mod registry_ffmpeg;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use exec_ffmpeg::FfmpegProcessAdapter;
pub use media_index_log::LogMediaIndex;
pub use probe_ffprobe::FfprobeAdapter;
pub use registry_ffmpeg::FfmpegEncoderRegistry;
pub use toml_config::{LogFormat, LoggingSettings, SplitterSettings, WatchdogSettings};
pub use tracing_log::init_logging;
