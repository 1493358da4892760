use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use vidflow_config::ConfigOverrides;
use vidflow_core::pipeline::session::UNDO_LOG_SUFFIX;
use vidflow_core::{SessionRoots, UndoLog};

use super::UndoArgs;
use super::convert::log_warnings;

pub async fn run(args: UndoArgs) -> Result<()> {
    let log_path = resolve_log(&args).await?;
    let log = UndoLog::new(&log_path);

    match log.undo_last().await? {
        Some(entry) => {
            info!(log = %log_path.display(), "undid {}", entry);
            println!(
                "restored {} (from {})",
                entry.original.display(),
                entry.destination.display()
            );
        }
        None => println!("nothing to undo in {}", log_path.display()),
    }
    Ok(())
}

async fn resolve_log(args: &UndoArgs) -> Result<PathBuf> {
    if let Some(log) = &args.log {
        return Ok(log.clone());
    }

    let load = args
        .common
        .loader(ConfigOverrides::default())
        .load()
        .context("failed to load configuration")?;
    log_warnings(&load.warnings);
    if let Some(log) = load.config.logs.undo_log {
        return Ok(log);
    }

    let source = args
        .source
        .as_ref()
        .ok_or_else(|| anyhow!("give SOURCE or --log"))?;
    let source = tokio::fs::canonicalize(source)
        .await
        .with_context(|| format!("cannot resolve {}", source.display()))?;
    Ok(SessionRoots::derive(&source)?.sibling_file(UNDO_LOG_SUFFIX))
}
