//! Append-only log of file moves, replayable in reverse one step at a time.
//!
//! Each line reads `<original> -> <destination>`. Undoing pops the last line
//! and moves the file back.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error_area::move_file;
use crate::error::{PipelineError, Result};

const SEPARATOR: &str = " -> ";

/// One recorded move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub original: PathBuf,
    pub destination: PathBuf,
}

impl UndoEntry {
    pub fn parse(line: &str) -> Option<Self> {
        let (original, destination) = line.trim_end().split_once(SEPARATOR)?;
        if original.is_empty() || destination.is_empty() {
            return None;
        }
        Some(Self {
            original: PathBuf::from(original),
            destination: PathBuf::from(destination),
        })
    }
}

impl fmt::Display for UndoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}",
            self.original.display(),
            self.destination.display()
        )
    }
}

#[derive(Debug)]
pub struct UndoLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UndoLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, original: &Path, destination: &Path) -> Result<()> {
        let entry = UndoEntry {
            original: original.to_path_buf(),
            destination: destination.to_path_buf(),
        };
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        file.flush().await?;
        debug!(log = %self.path.display(), "recorded move: {}", entry);
        Ok(())
    }

    /// Every recorded move, oldest first. A missing log has no entries.
    pub async fn entries(&self) -> Result<Vec<UndoEntry>> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    /// Reverse the most recent move. Returns `Ok(None)` when nothing is left
    /// to undo.
    ///
    /// The log is only rewritten after the file is back in place; a failed
    /// move leaves the log untouched.
    pub async fn undo_last(&self) -> Result<Option<UndoEntry>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let Some(entry) = entries.pop() else {
            info!(log = %self.path.display(), "nothing to undo");
            return Ok(None);
        };

        if !tokio::fs::try_exists(&entry.destination).await? {
            return Err(PipelineError::UndoLog(format!(
                "{} no longer exists",
                entry.destination.display()
            )));
        }
        if tokio::fs::try_exists(&entry.original).await? {
            return Err(PipelineError::UndoLog(format!(
                "refusing to overwrite {}",
                entry.original.display()
            )));
        }

        if let Some(parent) = entry.original.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        move_file(&entry.destination, &entry.original).await?;

        let remaining: String =
            entries.iter().map(|e| format!("{e}\n")).collect();
        tokio::fs::write(&self.path, remaining).await?;
        info!(
            from = %entry.destination.display(),
            to = %entry.original.display(),
            "undid move"
        );
        Ok(Some(entry))
    }

    async fn read_entries(&self) -> Result<Vec<UndoEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match UndoEntry::parse(line) {
                Some(entry) => entries.push(entry),
                None => warn!(
                    log = %self.path.display(),
                    line = idx + 1,
                    "ignoring malformed undo entry"
                ),
            }
        }
        Ok(entries)
    }
}
