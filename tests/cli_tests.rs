use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn splitter(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("splitter").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("SPLITTER_FFMPEG")
        .env_remove("SPLITTER_FFPROBE")
        .env_remove("SPLITTER_LOG_LEVEL")
        .env_remove("SPLITTER_FAILURE_THRESHOLD")
        .env_remove("SPLITTER_MAX_PARALLEL");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("split"))
        .stdout(predicate::str::contains("capabilities"));
}

#[test]
fn test_zero_interval_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .args(["split", "-i", "in.mp4", "-o", "out", "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--interval"));
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .args(["split", "-i", "missing.mp4", "-o", "out", "-n", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file does not exist"));
}

#[test]
fn test_invalid_env_threshold_is_reported() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .env("SPLITTER_FAILURE_THRESHOLD", "0")
        .args(["capabilities"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings"));
}

#[test]
fn test_explicit_settings_file_must_exist() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .args(["--config", "nowhere.toml", "capabilities"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}

#[test]
fn test_settings_file_in_working_directory_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("splitter.toml"), "hardware_failure_threshold = 0\n").unwrap();
    splitter(&dir)
        .args(["capabilities"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings"));
}

#[test]
fn test_capabilities_without_ffmpeg_fails() {
    let dir = TempDir::new().unwrap();
    splitter(&dir)
        .args(["--ffmpeg", "/nonexistent/bin/ffmpeg", "capabilities", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to detect encoder capabilities"));
}

#[test]
fn test_split_without_ffmpeg_reports_failed_segments() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.mp4"), b"not really a video").unwrap();
    splitter(&dir)
        .args([
            "--ffmpeg",
            "/nonexistent/bin/ffmpeg",
            "split",
            "-i",
            "in.mp4",
            "-o",
            "out",
            "-n",
            "2",
            "--duration-ms",
            "4500",
            "--width",
            "640",
            "--height",
            "360",
            "--json",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("\"failed_segments\""));
}
