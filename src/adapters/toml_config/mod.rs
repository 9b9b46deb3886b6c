// TOML config adapter - Settings loaded from file and environment

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::WatchdogLimits;
use crate::error::{SmartSplitResult, SplitError};

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "splitter.toml";

pub const ENV_FFMPEG: &str = "SPLITTER_FFMPEG";
pub const ENV_FFPROBE: &str = "SPLITTER_FFPROBE";
pub const ENV_LOG_LEVEL: &str = "SPLITTER_LOG_LEVEL";
pub const ENV_FAILURE_THRESHOLD: &str = "SPLITTER_FAILURE_THRESHOLD";
pub const ENV_MAX_PARALLEL: &str = "SPLITTER_MAX_PARALLEL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(config_error(format!(
                "Unknown log format: {}. Valid formats: pretty, compact, json",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub wall_clock_secs: u64,
    pub max_idle_iterations: u32,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        let limits = WatchdogLimits::default();
        Self {
            wall_clock_secs: limits.wall_clock.as_secs(),
            max_idle_iterations: limits.max_idle_iterations,
        }
    }
}

impl WatchdogSettings {
    pub fn limits(&self) -> WatchdogLimits {
        WatchdogLimits {
            wall_clock: Duration::from_secs(self.wall_clock_secs),
            max_idle_iterations: self.max_idle_iterations,
        }
    }
}

/// Runtime settings of the splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Hardware failures tolerated before the run switches to software
    pub hardware_failure_threshold: u32,
    /// Worker pool size for parallel runs; derived from the CPU count when unset
    pub max_parallel: Option<usize>,
    pub audio_bitrate: String,
    pub watchdog: WatchdogSettings,
    pub logging: LoggingSettings,
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            hardware_failure_threshold: 1,
            max_parallel: None,
            audio_bitrate: "128k".to_string(),
            watchdog: WatchdogSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl SplitterSettings {
    pub fn from_toml_str(content: &str) -> SmartSplitResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_file(path: &Path) -> SmartSplitResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;
        let settings = Self::from_toml_str(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Defaults, then the settings file, then the process environment
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_SETTINGS_FILE`] is
    /// read when present in the working directory.
    pub fn load(explicit: Option<&Path>) -> SmartSplitResult<Self> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(explicit: Option<&Path>, lookup: F) -> SmartSplitResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match explicit {
            Some(path) => Self::load_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_SETTINGS_FILE);
                if fallback.is_file() {
                    Self::load_file(fallback)?
                } else {
                    debug!("No settings file found, using defaults");
                    Self::default()
                }
            }
        };
        settings.apply_env(lookup)?;
        Ok(settings)
    }

    /// Override fields from `SPLITTER_*` variables
    pub fn apply_env<F>(&mut self, lookup: F) -> SmartSplitResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FFMPEG) {
            self.ffmpeg_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_FFPROBE) {
            self.ffprobe_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value.trim().to_lowercase();
        }
        if let Some(value) = lookup(ENV_FAILURE_THRESHOLD) {
            self.hardware_failure_threshold = parse_env(ENV_FAILURE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_PARALLEL) {
            self.max_parallel = Some(parse_env(ENV_MAX_PARALLEL, &value)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> SmartSplitResult<()> {
        if self.hardware_failure_threshold == 0 {
            return Err(config_error("hardware_failure_threshold must be at least 1"));
        }
        if self.max_parallel == Some(0) {
            return Err(config_error("max_parallel must be at least 1"));
        }
        if self.watchdog.wall_clock_secs == 0 || self.watchdog.max_idle_iterations == 0 {
            return Err(config_error("watchdog limits must be greater than 0"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(config_error(format!(
                "Unknown log level: {}. Valid levels: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.audio_bitrate.trim().is_empty() {
            return Err(config_error("audio_bitrate cannot be empty"));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> SmartSplitResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| config_error(format!("Invalid value for {}: {}", key, value)))
}

fn config_error(message: impl Into<String>) -> SplitError {
    SplitError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = SplitterSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.hardware_failure_threshold, 1);
        assert_eq!(settings.watchdog.limits(), WatchdogLimits::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = SplitterSettings::from_toml_str(
            r#"
            hardware_failure_threshold = 3

            [watchdog]
            wall_clock_secs = 60

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.hardware_failure_threshold, 3);
        assert_eq!(settings.watchdog.wall_clock_secs, 60);
        assert_eq!(settings.watchdog.max_idle_iterations, 1000);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("splitter.toml");
        std::fs::write(&path, "ffmpeg_path = \"/opt/ffmpeg\"\nmax_parallel = 2\n").unwrap();

        let settings = SplitterSettings::load_with_env(
            Some(&path),
            env(&[(ENV_MAX_PARALLEL, "6"), (ENV_LOG_LEVEL, "DEBUG")]),
        )
        .unwrap();
        assert_eq!(settings.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(settings.max_parallel, Some(6));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut settings = SplitterSettings::default();
        let err = settings
            .apply_env(env(&[(ENV_FAILURE_THRESHOLD, "often")]))
            .unwrap_err();
        assert!(matches!(err, SplitError::Config { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let missing = Path::new("/nonexistent/splitter.toml");
        let err = SplitterSettings::load_with_env(Some(missing), env(&[])).unwrap_err();
        assert!(matches!(err, SplitError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = SplitterSettings::default();
        settings.hardware_failure_threshold = 0;
        assert!(settings.validate().is_err());

        let mut settings = SplitterSettings::default();
        settings.max_parallel = Some(0);
        assert!(settings.validate().is_err());

        let mut settings = SplitterSettings::default();
        settings.logging.level = "loud".to_string();
        assert!(settings.validate().is_err());

        let mut settings = SplitterSettings::default();
        settings.watchdog.max_idle_iterations = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
