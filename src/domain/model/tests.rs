// Unit tests for domain models

use super::*;

fn config() -> SplitConfig {
    SplitConfig::new("/videos/input.mp4", "/videos/out", 10, 65_000).with_prefix("clip")
}

#[test]
fn test_quality_preset_parse() {
    assert_eq!("fast".parse::<QualityPreset>().unwrap(), QualityPreset::Fast);
    assert_eq!(" Balanced ".parse::<QualityPreset>().unwrap(), QualityPreset::Balanced);
    assert_eq!("QUALITY".parse::<QualityPreset>().unwrap(), QualityPreset::Quality);
    assert!("ultra".parse::<QualityPreset>().is_err());
}

#[test]
fn test_output_file_name_is_one_based_and_padded() {
    let config = config();
    assert_eq!(config.output_file_name(0, 7), "clip_01.mp4");
    assert_eq!(config.output_file_name(9, 12), "clip_10.mp4");
    assert_eq!(config.output_file_name(4, 150), "clip_005.mp4");
    assert_eq!(
        config.output_path(1, 7),
        PathBuf::from("/videos/out").join("clip_02.mp4")
    );
}

#[test]
fn test_validate_accepts_sane_config() {
    assert!(config().validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut zero_interval = config();
    zero_interval.interval_seconds = 0;
    assert!(zero_interval.validate().is_err());

    let mut zero_duration = config();
    zero_duration.total_duration_ms = 0;
    assert!(zero_duration.validate().is_err());

    let mut too_long = config();
    too_long.interval_seconds = 66;
    assert!(too_long.validate().is_err());

    assert!(config().with_prefix("  ").validate().is_err());
    assert!(config().with_resolution(0, 720).validate().is_err());
}

#[test]
fn test_segment_time_conversions() {
    let segment = Segment::new(2, 10.0, 5.4);
    assert_eq!(segment.start_us(), 10_000_000);
    assert_eq!(segment.end_us(), 15_400_000);
    assert_eq!(segment.duration_ms(), 5_400);
    assert_eq!(segment.to_string(), "#2 [10.000s - 15.400s)");
}

#[test]
fn test_split_result_sorts_outputs_and_failures() {
    let results = vec![
        SegmentResult::success(2, "/out/clip_03.mp4", false),
        SegmentResult::failure(1, "Encoder could not be opened", true)
            .with_diagnostics(Some("ffmpeg -i in.mp4".to_string()), Some("x".repeat(5000))),
        SegmentResult::success(0, "/out/clip_01.mp4", true),
    ];

    let result = SplitResult::from_results(&results, Utc::now(), Duration::from_secs(3));

    assert!(!result.success);
    assert!(result.hardware_accelerated);
    assert_eq!(
        result.output_files,
        vec![PathBuf::from("/out/clip_01.mp4"), PathBuf::from("/out/clip_03.mp4")]
    );
    assert_eq!(result.failed_segments, vec![1]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(
        result.failures[0].log_excerpt.as_ref().map(|l| l.len()),
        Some(MAX_LOG_EXCERPT_CHARS)
    );
    assert_eq!(
        result.error_message.as_deref(),
        Some("segment 2: Encoder could not be opened")
    );
}

#[test]
fn test_split_result_all_success() {
    let results = vec![
        SegmentResult::success(0, "/out/a_01.mp4", false),
        SegmentResult::success(1, "/out/a_02.mp4", false),
    ];
    let result = SplitResult::from_results(&results, Utc::now(), Duration::from_millis(10));
    assert!(result.success);
    assert!(!result.hardware_accelerated);
    assert!(result.error_message.is_none());
    assert!(result.failed_segments.is_empty());
}

#[test]
fn test_split_result_serializes_elapsed_ms() {
    let result = SplitResult::from_results(&[], Utc::now(), Duration::from_millis(1500));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["elapsed_ms"], 1500);
}

#[test]
fn test_text_truncation_helpers() {
    assert_eq!(tail_chars("abcdef", 3), "def");
    assert_eq!(tail_chars("ab", 3), "ab");
    assert_eq!(truncate_chars("abcdef", 3), "abc...");
    assert_eq!(truncate_chars("abc", 3), "abc");
}
