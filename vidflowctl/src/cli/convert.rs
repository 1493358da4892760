use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vidflow_config::{ConfigLoad, ConfigWarnings};
use vidflow_core::{Session, SessionReport};

use super::ConvertArgs;
use super::prompt::{PromptGate, prompt_source};

pub async fn run(args: ConvertArgs, shutdown: CancellationToken) -> Result<()> {
    let ConfigLoad { config, warnings } = args
        .common
        .loader(args.overrides())
        .load()
        .context("failed to load configuration")?;
    log_warnings(&warnings);

    let source = match &args.source {
        Some(source) => source.clone(),
        None => prompt_source()?,
    };

    let session = Session::prepare(config.session_options(&source))
        .await
        .with_context(|| format!("cannot start on {}", source.display()))?;
    info!(
        mode = %session.mode(),
        files = session.files().len(),
        source = %session.roots().source.display(),
        "session ready"
    );

    let mut gate = PromptGate;
    let report = session.run(&mut gate, shutdown).await?;
    print_report(&report);
    Ok(())
}

pub fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }
}

fn print_report(report: &SessionReport) {
    println!("{}", report.summary);
    println!("converted: {}", report.roots.converted.display());
    if report.summary.count(vidflow_core::OperationStatus::Error) > 0 {
        println!("errors:    {}", report.roots.errors.display());
        println!("undo log:  {}", report.undo_log.display());
    }
    if !report.reaped.is_empty() {
        println!("removed {} empty folder(s)", report.reaped.len());
    }
    if report.stopped_early {
        println!("stopped early; run again to process the remaining files");
    }
}
