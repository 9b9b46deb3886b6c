use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use smart_split::adapters::{LogFormat, SplitterSettings};
use smart_split::app::{AppContainer, DefaultAppContainer};
use smart_split::SplitError;

const FULL_SETTINGS: &str = r#"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
ffprobe_path = "/opt/ffmpeg/bin/ffprobe"
hardware_failure_threshold = 2
max_parallel = 3
audio_bitrate = "192k"

[watchdog]
wall_clock_secs = 120
max_idle_iterations = 500

[logging]
level = "debug"
format = "json"
"#;

fn write_settings(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, FULL_SETTINGS);

    let settings = SplitterSettings::load_with_env(Some(&path), |_: &str| None).unwrap();

    assert_eq!(settings.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(settings.ffprobe_path, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
    assert_eq!(settings.hardware_failure_threshold, 2);
    assert_eq!(settings.max_parallel, Some(3));
    assert_eq!(settings.audio_bitrate, "192k");
    assert_eq!(settings.watchdog.limits().wall_clock, Duration::from_secs(120));
    assert_eq!(settings.watchdog.limits().max_idle_iterations, 500);
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.logging.format, LogFormat::Json);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, FULL_SETTINGS);

    let settings = SplitterSettings::load_with_env(Some(&path), |key: &str| match key {
        "SPLITTER_FFMPEG" => Some("/usr/local/bin/ffmpeg".to_string()),
        "SPLITTER_MAX_PARALLEL" => Some("8".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(settings.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
    assert_eq!(settings.max_parallel, Some(8));
    assert_eq!(settings.hardware_failure_threshold, 2);
}

#[test]
fn test_malformed_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "hardware_failure_threshold = \"lots\"");

    let err = SplitterSettings::load_with_env(Some(&path), |_: &str| None).unwrap_err();
    assert!(matches!(err, SplitError::Toml(_)));
}

#[test]
fn test_container_applies_orchestrator_settings() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, FULL_SETTINGS);
    let settings = SplitterSettings::load_with_env(Some(&path), |_: &str| None).unwrap();

    let container = DefaultAppContainer::new(&settings);
    let orchestrator = container.split_orchestrator();

    assert_eq!(orchestrator.failure_threshold(), 2);
    assert_eq!(orchestrator.max_parallel(), 3);
    assert!(container.capability_probe().cached().is_none());
}
