use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::error_area::ErrorArea;
use super::recycle::Recycler;
use super::undo::UndoLog;
use crate::record::{ErrorType, OperationRecord};
use crate::types::ConversionTask;

/// Decides the fate of an original once its conversion finished.
///
/// Routing never fails: every problem is folded into the returned record and
/// logged.
#[derive(Debug)]
pub struct OutcomeRouter {
    errors: ErrorArea,
    recycler: Arc<dyn Recycler>,
    undo: Option<Arc<UndoLog>>,
}

impl OutcomeRouter {
    pub fn new(error_root: impl Into<PathBuf>, recycler: Arc<dyn Recycler>) -> Self {
        Self {
            errors: ErrorArea::new(error_root),
            recycler,
            undo: None,
        }
    }

    /// Record every move into the error root in `log`.
    pub fn with_undo_log(mut self, log: Arc<UndoLog>) -> Self {
        self.undo = Some(log);
        self
    }

    pub fn error_root(&self) -> &Path {
        self.errors.root()
    }

    pub fn recycler(&self) -> &dyn Recycler {
        self.recycler.as_ref()
    }

    pub async fn route(
        &self,
        task: &ConversionTask,
        converted: bool,
    ) -> OperationRecord {
        let original = task.original.as_path();

        if !matches!(tokio::fs::try_exists(original).await, Ok(true)) {
            if converted {
                warn!(
                    original = %original.display(),
                    output = %task.output_path().display(),
                    "original vanished during conversion; keeping output"
                );
            } else {
                info!(original = %original.display(), "original gone; skipping");
            }
            return OperationRecord::skipped(original);
        }

        if !converted {
            let moved_to = self.quarantine(original).await;
            return OperationRecord::failed(
                original,
                ErrorType::ConversionFailed,
                moved_to,
            );
        }

        match self.recycler.recycle(original).await {
            Ok(()) => {
                let output = task.output_path();
                info!(
                    original = %original.display(),
                    output = %output.display(),
                    recycler = self.recycler.label(),
                    "converted and recycled"
                );
                OperationRecord::converted(original, output)
            }
            Err(err) => {
                error!(
                    original = %original.display(),
                    recycler = self.recycler.label(),
                    "failed to recycle original: {}",
                    err
                );
                let moved_to = self.quarantine(original).await;
                discard_output(&task.output_path()).await;
                OperationRecord::failed(
                    original,
                    ErrorType::RecyclingFailed,
                    moved_to,
                )
            }
        }
    }

    async fn quarantine(&self, original: &Path) -> Option<PathBuf> {
        let destination = match self.errors.admit(original).await {
            Ok(destination) => destination,
            Err(err) => {
                error!(
                    original = %original.display(),
                    error_root = %self.errors.root().display(),
                    "could not move original to error area: {}",
                    err
                );
                return None;
            }
        };
        if let Some(log) = &self.undo
            && let Err(err) = log.record(original, &destination).await
        {
            warn!(
                log = %log.path().display(),
                "failed to append undo entry: {}",
                err
            );
        }
        Some(destination)
    }
}

async fn discard_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => info!(output = %output.display(), "removed orphaned output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            output = %output.display(),
            "failed to remove orphaned output: {}",
            err
        ),
    }
}
