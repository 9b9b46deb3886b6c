//! Codec registry read from `ffmpeg -encoders`

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{SmartSplitResult, SplitError};
use crate::ports::{CodecDescriptor, CodecRegistryPort};

/// Name suffixes of ffmpeg encoders that wrap a hardware codec
const HARDWARE_SUFFIXES: &[&str] = &[
    "_nvenc",
    "_qsv",
    "_vaapi",
    "_amf",
    "_videotoolbox",
    "_v4l2m2m",
    "_mf",
    "_omx",
    "_mediacodec",
    "_vulkan",
    "_rkmpp",
];

/// Parse one line of `ffmpeg -encoders` output
///
/// Lines look like ` V....D h264_nvenc   NVIDIA NVENC H.264 encoder (codec h264)`.
/// Only video encoders are returned.
pub fn parse_encoder_line(line: &str) -> Option<CodecDescriptor> {
    let mut fields = line.split_whitespace();
    let flags = fields.next()?;
    let name = fields.next()?;
    if flags.len() != 6 || !flags.starts_with('V') || name == "=" {
        return None;
    }

    let codec_type = line
        .rfind("(codec ")
        .and_then(|start| {
            let rest = &line[start + "(codec ".len()..];
            rest.find(')').map(|end| rest[..end].trim().to_string())
        })
        .unwrap_or_else(|| name.to_string());

    let mut descriptor = CodecDescriptor::encoder(name, codec_type);
    descriptor.hardware_accelerated = Some(HARDWARE_SUFFIXES.iter().any(|s| name.ends_with(s)));
    Some(descriptor)
}

pub fn parse_encoder_list(output: &str) -> Vec<CodecDescriptor> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(parse_encoder_line)
        .collect()
}

/// [`CodecRegistryPort`] that asks the ffmpeg executable
pub struct FfmpegEncoderRegistry {
    program: PathBuf,
}

impl FfmpegEncoderRegistry {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CodecRegistryPort for FfmpegEncoderRegistry {
    async fn enumerate(&self) -> SmartSplitResult<Vec<CodecDescriptor>> {
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .output()
            .await
            .map_err(|e| SplitError::Probe {
                message: format!("Failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            return Err(SplitError::Probe {
                message: format!(
                    "{} -encoders exited with {}",
                    self.program.display(),
                    output.status
                ),
            });
        }

        let descriptors = parse_encoder_list(&String::from_utf8_lossy(&output.stdout));
        debug!("Codec registry reported {} video encoders", descriptors.len());
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D hevc_vaapi           H.265/HEVC (VAAPI) (codec hevc)
 V....D mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn test_parse_encoder_list() {
        let descriptors = parse_encoder_list(SAMPLE);
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["libx264", "h264_nvenc", "hevc_vaapi", "mpeg4"]);

        assert!(descriptors[0].handles("h264"));
        assert_eq!(descriptors[0].hardware_accelerated, Some(false));
        assert_eq!(descriptors[1].hardware_accelerated, Some(true));
        assert!(descriptors[2].handles("hevc"));
        assert!(descriptors[3].handles("mpeg4"));
        assert!(descriptors.iter().all(|d| d.is_encoder));
    }

    #[test]
    fn test_legend_lines_are_skipped() {
        assert!(parse_encoder_line(" V..... = Video").is_none());
        assert!(parse_encoder_line(" A....D aac  AAC").is_none());
        assert!(parse_encoder_line("").is_none());
    }
}
