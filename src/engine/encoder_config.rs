//! Encoder configuration selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::model::{QualityLevel, QualityPreset};
use crate::probe::{CodecCapability, HardwareCapabilityProbe};

/// Software H.264 encoder used by the external engine
pub const SOFTWARE_VIDEO_CODEC: &str = "libx264";

/// Selected codec configuration for one or more segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Codec identifier passed to the engine
    pub codec: String,
    /// Codec-specific arguments for the external engine
    pub params: Vec<String>,
    pub hardware_accelerated: bool,
    pub description: String,
    pub quality: QualityLevel,
}

impl EncoderConfig {
    /// Software configuration for a preset
    ///
    /// Stricter presets use a lower CRF and a slower x264 preset.
    pub fn software(preset: QualityPreset) -> Self {
        let (crf, speed, quality) = match preset {
            QualityPreset::Fast => (28, "veryfast", QualityLevel::Low),
            QualityPreset::Balanced => (23, "medium", QualityLevel::Medium),
            QualityPreset::Quality => (18, "slow", QualityLevel::High),
        };
        Self {
            codec: SOFTWARE_VIDEO_CODEC.to_string(),
            params: vec![
                "-preset".to_string(),
                speed.to_string(),
                "-crf".to_string(),
                crf.to_string(),
            ],
            hardware_accelerated: false,
            description: format!("Software H.264 ({}, crf {})", speed, crf),
            quality,
        }
    }

    /// Hardware configuration; the engine manages bitrate itself
    pub fn hardware(encoder_name: &str) -> Self {
        Self {
            codec: encoder_name.to_string(),
            params: Vec::new(),
            hardware_accelerated: true,
            description: format!("Hardware H.264 ({})", encoder_name),
            quality: QualityLevel::High,
        }
    }
}

/// Picks hardware or software encoding from probed capability
#[derive(Clone)]
pub struct EncoderConfigFactory {
    probe: Arc<HardwareCapabilityProbe>,
}

impl EncoderConfigFactory {
    pub fn new(probe: Arc<HardwareCapabilityProbe>) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &Arc<HardwareCapabilityProbe> {
        &self.probe
    }

    pub fn software_config(&self, preset: QualityPreset) -> EncoderConfig {
        EncoderConfig::software(preset)
    }

    /// Best configuration for the request
    ///
    /// A probe failure is treated like missing hardware support.
    pub async fn best_config(
        &self,
        prefer_hardware: bool,
        width: u32,
        height: u32,
        preset: QualityPreset,
    ) -> EncoderConfig {
        if !prefer_hardware {
            info!("Hardware encoding disabled by caller, using software encoder");
            return EncoderConfig::software(preset);
        }

        let capability = match self.probe.detect_capabilities(false).await {
            Ok(capability) => capability,
            Err(e) => {
                warn!("Capability probe failed, downgrading to software encoding: {}", e);
                return EncoderConfig::software(preset);
            }
        };

        Self::select(&capability, width, height, preset)
    }

    /// Pure selection given a capability snapshot
    pub fn select(
        capability: &CodecCapability,
        width: u32,
        height: u32,
        preset: QualityPreset,
    ) -> EncoderConfig {
        let Some(encoder_name) = capability.h264_encoder_name() else {
            warn!("No hardware H.264 encoder available, downgrading to software encoding");
            return EncoderConfig::software(preset);
        };

        if !capability.fits(width, height) {
            if let Some((max_w, max_h)) = capability.max_resolution() {
                warn!(
                    "Resolution {}x{} exceeds hardware limit {}x{}, using software encoding",
                    width, height, max_w, max_h
                );
            }
            return EncoderConfig::software(preset);
        }

        info!("Using hardware encoder {}", encoder_name);
        EncoderConfig::hardware(encoder_name)
    }
}
