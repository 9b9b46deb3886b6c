//! SmartSplit Video Splitter Library
//!
//! Splits a video into fixed-length MP4 segments. Segments are encoded on a
//! hardware encoder when one is available and re-encoded in software when the
//! hardware path fails.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod planner;
pub mod ports;
pub mod probe;

// Re-export commonly used types
pub use app::{SplitOrchestrator, SplitState};
pub use domain::model::{QualityPreset, Segment, SegmentResult, SplitConfig, SplitResult};
pub use engine::{EncoderConfig, EncoderConfigFactory, SegmentTranscodeEngine};
pub use error::{SmartSplitResult, SplitError};
pub use planner::SegmentPlanner;
pub use probe::{CodecCapability, HardwareCapabilityProbe};
