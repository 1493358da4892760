pub mod error;

use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use tracing::debug;
use vidflow_core::{EncoderPreset, RecyclePolicy};

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    Config, ConfigMetadata, ConfigOverrides, EncoderConfig, LogsConfig,
    PipelineConfig, RecycleConfig, WatchConfig,
};
use crate::validation::{self, ConfigWarnings};
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("vidflow.toml"),
        PathBuf::from("config/vidflow.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment.
    pub env: Option<EnvConfig>,
    pub overrides: ConfigOverrides,
}

/// Resolves the effective configuration.
///
/// Precedence, highest first: command line overrides, environment, TOML
/// file, built-in defaults.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.options.overrides = overrides;
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingEnvFile {
                        path: path.clone(),
                    });
                }
                dotenvy::from_path(path)?;
                true
            }
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = match &self.options.env {
            Some(env) => env.clone(),
            None => EnvConfig::gather()?,
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut config = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;
        self.options.overrides.apply(&mut config);

        let warnings = validation::apply_guard_rails(&config)?;

        debug!(?config, "configuration resolved");
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(path) = &self.options.config_path {
            (path.clone(), true)
        } else if let Some(path) = &env_config.config_path {
            (path.clone(), true)
        } else {
            match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(path) => (path.clone(), false),
                None => return Ok((None, None)),
            }
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        encoder: file_encoder,
        pipeline: file_pipeline,
        watch: file_watch,
        recycle: file_recycle,
        logs: file_logs,
    } = file;

    let env_preset = env
        .preset
        .as_deref()
        .map(|raw| {
            raw.parse::<EncoderPreset>().map_err(|err| {
                ConfigLoadError::InvalidValue {
                    key: "VIDFLOW_PRESET",
                    value: raw.to_string(),
                    reason: err.to_string(),
                }
            })
        })
        .transpose()?;
    let env_recycle = env
        .recycle
        .as_deref()
        .map(|raw| {
            raw.parse::<RecyclePolicy>().map_err(|err| {
                ConfigLoadError::InvalidValue {
                    key: "VIDFLOW_RECYCLE",
                    value: raw.to_string(),
                    reason: err.to_string(),
                }
            })
        })
        .transpose()?;

    let encoder_defaults = EncoderConfig::default();
    let encoder = EncoderConfig {
        path: env
            .encoder_path
            .or(file_encoder.path)
            .unwrap_or(encoder_defaults.path),
        preset: env_preset
            .or(file_encoder.preset)
            .unwrap_or(encoder_defaults.preset),
    };

    let pipeline_defaults = PipelineConfig::default();
    let pipeline = PipelineConfig {
        auto_continue: env
            .auto_continue
            .or(file_pipeline.auto_continue)
            .unwrap_or(pipeline_defaults.auto_continue),
        batch_size: env
            .batch_size
            .or(file_pipeline.batch_size)
            .unwrap_or(pipeline_defaults.batch_size),
        parallel: env
            .parallel
            .or(file_pipeline.parallel)
            .unwrap_or(pipeline_defaults.parallel),
        all_cores: env
            .all_cores
            .or(file_pipeline.all_cores)
            .unwrap_or(pipeline_defaults.all_cores),
        workers: env.workers.or(file_pipeline.workers),
        channel_capacity: env
            .channel_capacity
            .or(file_pipeline.channel_capacity),
        media_extensions: env
            .media_extensions
            .or(file_pipeline.media_extensions)
            .unwrap_or(pipeline_defaults.media_extensions),
    };

    let watch_defaults = WatchConfig::default();
    let watch = WatchConfig {
        enabled: env
            .watch
            .or(file_watch.enabled)
            .unwrap_or(watch_defaults.enabled),
        settle_delay_ms: env
            .settle_delay_ms
            .or(file_watch.settle_delay_ms)
            .unwrap_or(watch_defaults.settle_delay_ms),
        stable_checks: env
            .stable_checks
            .or(file_watch.stable_checks)
            .unwrap_or(watch_defaults.stable_checks),
        max_settle_polls: env
            .max_settle_polls
            .or(file_watch.max_settle_polls)
            .unwrap_or(watch_defaults.max_settle_polls),
    };

    let recycle = RecycleConfig {
        policy: env_recycle.or(file_recycle.policy).unwrap_or_default(),
    };

    let logs = LogsConfig {
        undo_log: env.undo_log.or(file_logs.undo_log),
    };

    Ok(Config {
        encoder,
        pipeline,
        watch,
        recycle,
        logs,
        metadata,
    })
}
