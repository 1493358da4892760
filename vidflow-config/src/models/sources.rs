use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use vidflow_core::{EncoderPreset, RecyclePolicy};

use crate::loader::error::ConfigLoadError;
use crate::util::{parse_csv, parse_flag, parse_number};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub encoder: FileEncoderConfig,
    #[serde(default)]
    pub pipeline: FilePipelineConfig,
    #[serde(default)]
    pub watch: FileWatchConfig,
    #[serde(default)]
    pub recycle: FileRecycleConfig,
    #[serde(default)]
    pub logs: FileLogsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileEncoderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<EncoderPreset>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilePipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_continue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_cores: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileWatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_checks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_settle_polls: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRecycleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<RecyclePolicy>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileLogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_log: Option<PathBuf>,
}

/// Environment-derived configuration values.
///
/// Enumerated values (`preset`, `recycle`) are kept raw so the loader can
/// report a bad value instead of silently ignoring it.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub encoder_path: Option<PathBuf>,
    pub preset: Option<String>,
    pub auto_continue: Option<bool>,
    pub batch_size: Option<usize>,
    pub parallel: Option<bool>,
    pub all_cores: Option<bool>,
    pub workers: Option<usize>,
    pub channel_capacity: Option<usize>,
    pub media_extensions: Option<Vec<String>>,
    pub watch: Option<bool>,
    pub settle_delay_ms: Option<u64>,
    pub stable_checks: Option<u32>,
    pub max_settle_polls: Option<u32>,
    pub recycle: Option<String>,
    pub undo_log: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Blank variables count as unset; anything else that does not parse is
    /// an error naming the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        Ok(Self {
            config_path: var("VIDFLOW_CONFIG").map(PathBuf::from),
            // The vidflow-specific name wins over the generic one.
            encoder_path: var("VIDFLOW_ENCODER")
                .or_else(|| var("FFMPEG_PATH"))
                .map(PathBuf::from),
            preset: var("VIDFLOW_PRESET"),

            auto_continue: parse_flag(
                "VIDFLOW_AUTO_CONTINUE",
                var("VIDFLOW_AUTO_CONTINUE"),
            )?,
            batch_size: parse_number(
                "VIDFLOW_BATCH_SIZE",
                var("VIDFLOW_BATCH_SIZE"),
            )?,
            parallel: parse_flag("VIDFLOW_PARALLEL", var("VIDFLOW_PARALLEL"))?,
            all_cores: parse_flag(
                "VIDFLOW_ALL_CORES",
                var("VIDFLOW_ALL_CORES"),
            )?,
            workers: parse_number("VIDFLOW_WORKERS", var("VIDFLOW_WORKERS"))?,
            channel_capacity: parse_number(
                "VIDFLOW_CHANNEL_CAPACITY",
                var("VIDFLOW_CHANNEL_CAPACITY"),
            )?,
            media_extensions: var("VIDFLOW_MEDIA_EXTENSIONS")
                .map(|s| parse_csv(&s)),

            watch: parse_flag("VIDFLOW_WATCH", var("VIDFLOW_WATCH"))?,
            settle_delay_ms: parse_number(
                "VIDFLOW_SETTLE_DELAY_MS",
                var("VIDFLOW_SETTLE_DELAY_MS"),
            )?,
            stable_checks: parse_number(
                "VIDFLOW_STABLE_CHECKS",
                var("VIDFLOW_STABLE_CHECKS"),
            )?,
            max_settle_polls: parse_number(
                "VIDFLOW_MAX_SETTLE_POLLS",
                var("VIDFLOW_MAX_SETTLE_POLLS"),
            )?,

            recycle: var("VIDFLOW_RECYCLE"),
            undo_log: var("VIDFLOW_UNDO_LOG").map(PathBuf::from),
        })
    }
}
