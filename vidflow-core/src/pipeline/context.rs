use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ledger::SessionLedger;
use crate::error::{PipelineError, Result};
use crate::record::OperationRecord;
use crate::routing::OutcomeRouter;
use crate::scan::PathScanner;
use crate::transcode::TranscodeEngine;
use crate::types::{ConversionTask, EncoderPreset};

pub const CONVERTED_SUFFIX: &str = "_converted";
pub const ERRORS_SUFFIX: &str = "_errors";

/// The source root and its two sibling output roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRoots {
    pub source: PathBuf,
    pub converted: PathBuf,
    pub errors: PathBuf,
}

impl SessionRoots {
    /// `<parent>/<name>_converted` and `<parent>/<name>_errors` next to
    /// `source`.
    pub fn derive(source: &Path) -> Result<Self> {
        let name = source
            .file_name()
            .ok_or_else(|| PipelineError::NotADirectory(source.to_path_buf()))?;
        let parent = source.parent().unwrap_or(source);
        Ok(Self {
            source: source.to_path_buf(),
            converted: parent.join(sibling_name(name, CONVERTED_SUFFIX)),
            errors: parent.join(sibling_name(name, ERRORS_SUFFIX)),
        })
    }

    /// `<parent>/<name><suffix>`, used for the undo and crash logs.
    pub fn sibling_file(&self, suffix: &str) -> PathBuf {
        let name = self.source.file_name().unwrap_or_default();
        let parent = self.source.parent().unwrap_or(&self.source);
        parent.join(sibling_name(name, suffix))
    }
}

fn sibling_name(name: &std::ffi::OsStr, suffix: &str) -> OsString {
    let mut sibling = name.to_os_string();
    sibling.push(suffix);
    sibling
}

/// Everything a worker needs, shared behind an `Arc` for the whole session.
#[derive(Debug)]
pub struct PipelineContext {
    pub roots: SessionRoots,
    pub preset: EncoderPreset,
    pub scanner: PathScanner,
    pub engine: TranscodeEngine,
    pub router: OutcomeRouter,
    pub ledger: SessionLedger,
}

impl PipelineContext {
    pub fn task_for(&self, original: PathBuf) -> ConversionTask {
        ConversionTask {
            original,
            source_root: self.roots.source.clone(),
            output_root: self.roots.converted.clone(),
            error_root: self.roots.errors.clone(),
            preset: self.preset,
        }
    }

    /// Run one task to completion and append its record to the ledger.
    pub async fn process(&self, task: &ConversionTask) -> OperationRecord {
        let record = if matches!(tokio::fs::try_exists(&task.original).await, Ok(true)) {
            let converted = self.engine.convert(task).await;
            self.router.route(task, converted).await
        } else {
            info!(original = %task.original.display(), "original gone; skipping");
            OperationRecord::skipped(&task.original)
        };
        let progress = self.ledger.append(record.clone());
        info!(
            completed = progress.completed,
            total = progress.total,
            status = %record.status(),
            "completed {}",
            progress
        );
        record
    }
}
