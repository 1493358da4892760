pub mod sources;

use std::path::{Path, PathBuf};
use std::time::Duration;

use vidflow_core::scan::default_media_extensions_vec;
use vidflow_core::{
    EncoderPreset, RecyclePolicy, SessionOptions, SettlePolicy,
};

pub const DEFAULT_ENCODER_PATH: &str = "ffmpeg";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_STABLE_CHECKS: u32 = 2;
pub const DEFAULT_MAX_SETTLE_POLLS: u32 = 40;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub encoder: EncoderConfig,
    pub pipeline: PipelineConfig,
    pub watch: WatchConfig,
    pub recycle: RecycleConfig,
    pub logs: LogsConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Session settings for `source` derived from this configuration.
    pub fn session_options(&self, source: &Path) -> SessionOptions {
        let mut options = SessionOptions::new(source);
        options.encoder = self.encoder.path.clone();
        options.preset = self.encoder.preset;
        options.media_extensions = self.pipeline.media_extensions.clone();
        options.auto_continue = self.pipeline.auto_continue;
        options.batch_size = self.pipeline.batch_size;
        options.parallel = self.pipeline.parallel;
        options.all_cores = self.pipeline.all_cores;
        options.workers = self.pipeline.workers;
        options.channel_capacity = self.pipeline.channel_capacity;
        options.watch = self.watch.enabled;
        options.settle = self.watch.settle_policy();
        options.recycle = self.recycle.policy;
        options.undo_log = self.logs.undo_log.clone();
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub path: PathBuf,
    pub preset: EncoderPreset,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_ENCODER_PATH),
            preset: EncoderPreset::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub auto_continue: bool,
    pub batch_size: usize,
    pub parallel: bool,
    pub all_cores: bool,
    pub workers: Option<usize>,
    pub channel_capacity: Option<usize>,
    pub media_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_continue: false,
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            all_cores: false,
            workers: None,
            channel_capacity: None,
            media_extensions: default_media_extensions_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub enabled: bool,
    pub settle_delay_ms: u64,
    pub stable_checks: u32,
    pub max_settle_polls: u32,
}

impl WatchConfig {
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            stable_checks: self.stable_checks,
            max_settle_polls: self.max_settle_polls,
            ..SettlePolicy::default()
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            stable_checks: DEFAULT_STABLE_CHECKS,
            max_settle_polls: DEFAULT_MAX_SETTLE_POLLS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecycleConfig {
    pub policy: RecyclePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogsConfig {
    /// Undo log location; next to the source folder when unset.
    pub undo_log: Option<PathBuf>,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

/// Values supplied on the command line. Every `Some` wins over every other
/// source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub encoder_path: Option<PathBuf>,
    pub preset: Option<EncoderPreset>,
    pub auto_continue: Option<bool>,
    pub batch_size: Option<usize>,
    pub parallel: Option<bool>,
    pub all_cores: Option<bool>,
    pub workers: Option<usize>,
    pub watch: Option<bool>,
    pub recycle: Option<RecyclePolicy>,
    pub undo_log: Option<PathBuf>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.encoder_path {
            config.encoder.path = path.clone();
        }
        if let Some(preset) = self.preset {
            config.encoder.preset = preset;
        }
        if let Some(value) = self.auto_continue {
            config.pipeline.auto_continue = value;
        }
        if let Some(value) = self.batch_size {
            config.pipeline.batch_size = value;
        }
        if let Some(value) = self.parallel {
            config.pipeline.parallel = value;
        }
        if let Some(value) = self.all_cores {
            config.pipeline.all_cores = value;
        }
        if let Some(value) = self.workers {
            config.pipeline.workers = Some(value);
        }
        if let Some(value) = self.watch {
            config.watch.enabled = value;
        }
        if let Some(policy) = self.recycle {
            config.recycle.policy = policy;
        }
        if let Some(path) = &self.undo_log {
            config.logs.undo_log = Some(path.clone());
        }
    }
}
