use thiserror::Error;

use crate::models::Config;

/// Settle delays below this are unlikely to outlast a single write burst.
pub const MIN_RECOMMENDED_SETTLE_MS: u64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("media_extensions must list at least one extension")]
    NoMediaExtensions,
    #[error("channel_capacity must be at least 1")]
    ZeroChannelCapacity,
    #[error("workers must be at least 1")]
    ZeroWorkers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let pipeline = &config.pipeline;

    if pipeline.batch_size == 0 {
        return Err(ConfigGuardRailError::ZeroBatchSize);
    }
    if pipeline.media_extensions.iter().all(|ext| {
        ext.trim().trim_start_matches('.').is_empty()
    }) {
        return Err(ConfigGuardRailError::NoMediaExtensions);
    }
    if pipeline.channel_capacity == Some(0) {
        return Err(ConfigGuardRailError::ZeroChannelCapacity);
    }
    if pipeline.workers == Some(0) {
        return Err(ConfigGuardRailError::ZeroWorkers);
    }

    if config.recycle.policy.may_hard_delete() {
        warnings.push_with_hint(
            format!(
                "recycle policy '{}' can permanently delete originals",
                config.recycle.policy
            ),
            "Use policy = \"trash\" to keep originals recoverable",
        );
    }

    if config.watch.enabled
        && config.watch.settle_delay_ms < MIN_RECOMMENDED_SETTLE_MS
    {
        warnings.push_with_hint(
            format!(
                "settle delay of {}ms may pick up files that are still being written",
                config.watch.settle_delay_ms
            ),
            format!(
                "Raise watch.settle_delay_ms to at least {MIN_RECOMMENDED_SETTLE_MS}"
            ),
        );
    }

    if !pipeline.auto_continue && !pipeline.parallel && !config.watch.enabled
        && pipeline.batch_size == 1
    {
        warnings.push("batch_size = 1 pauses after every file");
    }

    Ok(warnings)
}
