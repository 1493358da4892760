use std::path::PathBuf;

use anyhow::{Result, anyhow};
use dialoguer::{Input, Select, console::Term};
use tracing::warn;
use vidflow_core::{BatchDecision, BatchGate, BatchProgress};

/// Ask for the source folder on stderr.
pub fn prompt_source() -> Result<PathBuf> {
    let raw: String = Input::new()
        .with_prompt("Folder to convert")
        .interact_text_on(&Term::stderr())?;
    let cleaned = clean_path(&raw);
    if cleaned.is_empty() {
        return Err(anyhow!("no source folder given"));
    }
    Ok(PathBuf::from(cleaned))
}

/// Strip whitespace and the quotes a drag-and-dropped path arrives with.
pub fn clean_path(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Asks on the terminal whether to go on after each batch.
#[derive(Debug, Default)]
pub struct PromptGate;

impl BatchGate for PromptGate {
    fn after_batch(&mut self, progress: &BatchProgress) -> BatchDecision {
        let prompt = format!(
            "Batch {} done ({} of {} files). Continue?",
            progress.batch, progress.processed, progress.total
        );
        match Select::new()
            .with_prompt(prompt)
            .items(&["Continue", "Stop"])
            .default(0)
            .interact_on(&Term::stderr())
        {
            Ok(0) => BatchDecision::Continue,
            Ok(_) => BatchDecision::Stop,
            Err(err) => {
                warn!(error = %err, "batch prompt failed; stopping");
                BatchDecision::Stop
            }
        }
    }
}
