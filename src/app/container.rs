use std::sync::Arc;

use crate::adapters::{
    FfmpegEncoderRegistry, FfmpegProcessAdapter, FfprobeAdapter, LogMediaIndex, SplitterSettings,
};
use crate::app::split_interactor::SplitOrchestrator;
use crate::engine::{
    EncoderConfigFactory, ExternalProcessEngine, NativeCodecEngine, SegmentTranscodeEngine,
};
use crate::ports::{
    CodecPlatform, CodecRegistryPort, MediaIndexPort, MediaProbePort, TranscoderPort,
};
use crate::probe::HardwareCapabilityProbe;

pub trait AppContainer: Send + Sync {
    fn split_orchestrator(&self) -> Arc<SplitOrchestrator>;
    fn capability_probe(&self) -> Arc<HardwareCapabilityProbe>;
    fn media_probe(&self) -> Arc<dyn MediaProbePort>;
}

/// Wires the ffmpeg adapters, the probe and both engines from settings
pub struct DefaultAppContainer {
    orchestrator: Arc<SplitOrchestrator>,
    capability_probe: Arc<HardwareCapabilityProbe>,
    media_probe: Arc<dyn MediaProbePort>,
}

impl DefaultAppContainer {
    /// Hardware segments go through ffmpeg with the probed hardware encoder
    pub fn new(settings: &SplitterSettings) -> Self {
        Self::build(settings, None)
    }

    /// Hardware segments run on the given platform codecs
    pub fn with_codec_platform(
        settings: &SplitterSettings,
        platform: Arc<dyn CodecPlatform>,
    ) -> Self {
        Self::build(settings, Some(platform))
    }

    fn build(settings: &SplitterSettings, platform: Option<Arc<dyn CodecPlatform>>) -> Self {
        let transcoder = Arc::new(FfmpegProcessAdapter::new(&settings.ffmpeg_path));
        let registry = Arc::new(FfmpegEncoderRegistry::new(&settings.ffmpeg_path));
        let media_index = Arc::new(LogMediaIndex::new());
        let media_probe: Arc<dyn MediaProbePort> =
            Arc::new(FfprobeAdapter::new(&settings.ffprobe_path));

        let capability_probe = Arc::new(HardwareCapabilityProbe::new(
            Arc::clone(&registry) as Arc<dyn CodecRegistryPort>,
        ));
        let factory = EncoderConfigFactory::new(Arc::clone(&capability_probe));

        let software_engine: Arc<dyn SegmentTranscodeEngine> = Arc::new(
            ExternalProcessEngine::new(Arc::clone(&transcoder) as Arc<dyn TranscoderPort>)
                .with_audio_bitrate(settings.audio_bitrate.clone()),
        );
        let hardware_engine: Arc<dyn SegmentTranscodeEngine> = match platform {
            Some(platform) => Arc::new(
                NativeCodecEngine::new(platform).with_limits(settings.watchdog.limits()),
            ),
            None => Arc::clone(&software_engine),
        };

        let mut orchestrator = SplitOrchestrator::new(
            factory,
            hardware_engine,
            software_engine,
            media_index as Arc<dyn MediaIndexPort>,
        )
        .with_failure_threshold(settings.hardware_failure_threshold);
        if let Some(max_parallel) = settings.max_parallel {
            orchestrator = orchestrator.with_max_parallel(max_parallel);
        }

        Self {
            orchestrator: Arc::new(orchestrator),
            capability_probe,
            media_probe,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn split_orchestrator(&self) -> Arc<SplitOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    fn capability_probe(&self) -> Arc<HardwareCapabilityProbe> {
        Arc::clone(&self.capability_probe)
    }

    fn media_probe(&self) -> Arc<dyn MediaProbePort> {
        Arc::clone(&self.media_probe)
    }
}
