//! Layered configuration for vidflow.
//!
//! Built-in defaults are overlaid by an optional `vidflow.toml`, then by
//! `VIDFLOW_*` environment variables (a `.env` file is honoured), then by
//! command line flags. The result is checked by guard rails that reject
//! unusable values and collect warnings for risky ones.

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    Config, ConfigMetadata, ConfigOverrides, EncoderConfig, LogsConfig,
    PipelineConfig, RecycleConfig, WatchConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
