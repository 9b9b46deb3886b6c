//! Hardware encoder capability detection

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SmartSplitResult;
use crate::ports::{BitrateMode, CodecDescriptor, CodecRegistryPort};

/// Name prefixes of codecs known to run on the CPU
pub const SOFTWARE_CODEC_PREFIXES: &[&str] = &[
    "omx.google.",
    "c2.android.",
    "c2.google.",
    "omx.ffmpeg.",
    "c2.ffmpeg.",
    "lib",
];

/// A hardware encoder found in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareEncoder {
    pub name: String,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub bitrate_modes: Vec<BitrateMode>,
}

/// Probed hardware encoding capability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodecCapability {
    pub h264: Option<HardwareEncoder>,
    pub hevc: Option<HardwareEncoder>,
}

impl CodecCapability {
    pub fn supports_h264(&self) -> bool {
        self.h264.is_some()
    }

    pub fn supports_hevc(&self) -> bool {
        self.hevc.is_some()
    }

    pub fn h264_encoder_name(&self) -> Option<&str> {
        self.h264.as_ref().map(|e| e.name.as_str())
    }

    /// Maximum resolution of the H.264 encoder when both bounds are known
    pub fn max_resolution(&self) -> Option<(u32, u32)> {
        let encoder = self.h264.as_ref()?;
        Some((encoder.max_width?, encoder.max_height?))
    }

    /// Whether the H.264 encoder can take `width`x`height`
    pub fn fits(&self, width: u32, height: u32) -> bool {
        match self.max_resolution() {
            Some((max_w, max_h)) => width <= max_w && height <= max_h,
            None => true,
        }
    }
}

/// Whether the name matches a known software codec pattern
pub fn is_software_codec_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SOFTWARE_CODEC_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Classify a registry entry, preferring the platform flag when present
pub fn is_hardware_codec(descriptor: &CodecDescriptor) -> bool {
    descriptor
        .hardware_accelerated
        .unwrap_or_else(|| !is_software_codec_name(&descriptor.name))
}

/// Build the capability from a registry listing
pub fn classify(descriptors: &[CodecDescriptor]) -> CodecCapability {
    let mut capability = CodecCapability::default();

    for descriptor in descriptors.iter().filter(|d| d.is_encoder) {
        if !is_hardware_codec(descriptor) {
            debug!("Skipping software encoder {}", descriptor.name);
            continue;
        }
        let encoder = HardwareEncoder {
            name: descriptor.name.clone(),
            max_width: descriptor.max_width,
            max_height: descriptor.max_height,
            bitrate_modes: descriptor.bitrate_modes.clone(),
        };
        if capability.h264.is_none() && descriptor.handles("h264") {
            capability.h264 = Some(encoder.clone());
        }
        if capability.hevc.is_none() && descriptor.handles("hevc") {
            capability.hevc = Some(encoder);
        }
    }

    capability
}

/// Memoized capability probe
///
/// Built once by the application container and shared by reference. The first
/// call enumerates the registry; later calls read the cached value until
/// `detect_capabilities(true)` replaces it.
pub struct HardwareCapabilityProbe {
    registry: Arc<dyn CodecRegistryPort>,
    cache: RwLock<Option<Arc<CodecCapability>>>,
}

impl HardwareCapabilityProbe {
    pub fn new(registry: Arc<dyn CodecRegistryPort>) -> Self {
        Self {
            registry,
            cache: RwLock::new(None),
        }
    }

    /// Probe with a pre-seeded value, skipping enumeration until a forced refresh
    pub fn with_capability(
        registry: Arc<dyn CodecRegistryPort>,
        capability: CodecCapability,
    ) -> Self {
        Self {
            registry,
            cache: RwLock::new(Some(Arc::new(capability))),
        }
    }

    pub async fn detect_capabilities(
        &self,
        force_refresh: bool,
    ) -> SmartSplitResult<Arc<CodecCapability>> {
        if !force_refresh {
            if let Some(cached) = self.cached() {
                return Ok(cached);
            }
        }

        let descriptors = self.registry.enumerate().await?;
        let capability = Arc::new(classify(&descriptors));
        info!(
            h264 = capability.h264_encoder_name().unwrap_or("none"),
            hevc = capability.hevc.as_ref().map(|e| e.name.as_str()).unwrap_or("none"),
            "Detected hardware encoder capability from {} codecs",
            descriptors.len()
        );

        let mut slot = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::clone(&capability));
        Ok(capability)
    }

    /// Current cached value, if any
    pub fn cached(&self) -> Option<Arc<CodecCapability>> {
        let slot = match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry whose listing changes on every enumeration
    struct ShiftingRegistry {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CodecRegistryPort for ShiftingRegistry {
        async fn enumerate(&self) -> SmartSplitResult<Vec<CodecDescriptor>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![CodecDescriptor::encoder(format!("h264_hw_{}", call), "h264")])
        }
    }

    #[test]
    fn test_software_name_patterns() {
        assert!(is_software_codec_name("OMX.google.h264.encoder"));
        assert!(is_software_codec_name("c2.android.avc.encoder"));
        assert!(is_software_codec_name("libx264"));
        assert!(!is_software_codec_name("OMX.qcom.video.encoder.avc"));
        assert!(!is_software_codec_name("h264_nvenc"));
    }

    #[test]
    fn test_platform_flag_overrides_name() {
        let mut flagged = CodecDescriptor::encoder("c2.android.avc.encoder", "h264");
        flagged.hardware_accelerated = Some(true);
        assert!(is_hardware_codec(&flagged));

        let mut soft = CodecDescriptor::encoder("c2.qti.avc.encoder", "h264");
        soft.hardware_accelerated = Some(false);
        assert!(!is_hardware_codec(&soft));
    }

    #[test]
    fn test_classify_records_first_hardware_encoders() {
        let mut qcom = CodecDescriptor::encoder("OMX.qcom.video.encoder.avc", "h264");
        qcom.max_width = Some(3840);
        qcom.max_height = Some(2160);
        qcom.bitrate_modes = vec![BitrateMode::Cbr, BitrateMode::Vbr];
        let mut decoder = CodecDescriptor::encoder("OMX.qcom.video.decoder.avc", "h264");
        decoder.is_encoder = false;

        let descriptors = vec![
            decoder,
            CodecDescriptor::encoder("OMX.google.h264.encoder", "h264"),
            qcom,
            CodecDescriptor::encoder("c2.exynos.avc.encoder", "h264"),
            CodecDescriptor::encoder("OMX.qcom.video.encoder.hevc", "hevc"),
        ];

        let capability = classify(&descriptors);
        assert_eq!(capability.h264_encoder_name(), Some("OMX.qcom.video.encoder.avc"));
        assert_eq!(capability.max_resolution(), Some((3840, 2160)));
        assert_eq!(
            capability.h264.as_ref().map(|e| e.bitrate_modes.clone()),
            Some(vec![BitrateMode::Cbr, BitrateMode::Vbr])
        );
        assert_eq!(
            capability.hevc.as_ref().map(|e| e.name.as_str()),
            Some("OMX.qcom.video.encoder.hevc")
        );
        assert!(capability.fits(1920, 1080));
        assert!(!capability.fits(4096, 2160));
    }

    #[test]
    fn test_software_only_registry_has_no_capability() {
        let descriptors = vec![
            CodecDescriptor::encoder("libx264", "h264"),
            CodecDescriptor::encoder("libx265", "hevc"),
        ];
        let capability = classify(&descriptors);
        assert!(!capability.supports_h264());
        assert!(!capability.supports_hevc());
        assert!(capability.fits(8000, 8000));
    }

    #[tokio::test]
    async fn test_cache_is_consulted_before_enumerating() {
        let registry = Arc::new(ShiftingRegistry {
            calls: AtomicUsize::new(0),
        });
        let probe = HardwareCapabilityProbe::new(registry.clone());

        let first = probe.detect_capabilities(false).await.unwrap();
        let second = probe.detect_capabilities(false).await.unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

        let refreshed = probe.detect_capabilities(true).await.unwrap();
        assert_eq!(refreshed.h264_encoder_name(), Some("h264_hw_1"));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
        assert_eq!(probe.cached().unwrap().h264_encoder_name(), Some("h264_hw_1"));
    }

    #[tokio::test]
    async fn test_seeded_probe_skips_enumeration() {
        let registry = Arc::new(ShiftingRegistry {
            calls: AtomicUsize::new(0),
        });
        let probe =
            HardwareCapabilityProbe::with_capability(registry.clone(), CodecCapability::default());
        let capability = probe.detect_capabilities(false).await.unwrap();
        assert!(!capability.supports_h264());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }
}
