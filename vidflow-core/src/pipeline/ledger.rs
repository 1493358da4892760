use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::record::{ErrorType, OperationRecord, OperationStatus};

/// Shared, append-only collection of every outcome produced this session.
///
/// Cloning yields another handle to the same ledger.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    records: Arc<Mutex<Vec<OperationRecord>>>,
    expected: Arc<AtomicUsize>,
}

/// Completed versus known tasks at one point of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `additional` tasks that will eventually be appended.
    pub fn expect(&self, additional: usize) {
        self.expected.fetch_add(additional, Ordering::AcqRel);
    }

    /// Withdraw tasks announced with [`expect`](Self::expect) that will not
    /// be appended after all.
    pub fn retract(&self, count: usize) {
        let _ = self.expected.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| Some(n.saturating_sub(count)),
        );
    }

    /// Record an outcome and return the progress including it.
    pub fn append(&self, record: OperationRecord) -> Progress {
        let mut records = self.records.lock();
        records.push(record);
        let completed = records.len();
        Progress {
            completed,
            total: self.expected.load(Ordering::Acquire).max(completed),
        }
    }

    pub fn progress(&self) -> Progress {
        let completed = self.len();
        Progress {
            completed,
            total: self.expected.load(Ordering::Acquire).max(completed),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of the records appended so far, in append order.
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().clone()
    }

    pub fn summary(&self) -> SessionSummary {
        let records = self.records.lock();
        let mut summary = SessionSummary::default();
        for record in records.iter() {
            summary.total += 1;
            *summary.by_status.entry(record.status()).or_default() += 1;
            if record.status() != OperationStatus::ConvertedAndRecycled
                && let Some(kind) = record.error_type()
            {
                *summary.by_error.entry(kind).or_default() += 1;
            }
        }
        summary
    }

    /// Write every record as one JSON object per line.
    pub fn flush_to(&self, path: &Path) -> Result<()> {
        let records = self.records();
        let mut body = String::new();
        for record in &records {
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)?;
        info!(
            path = %path.display(),
            records = records.len(),
            "session ledger written"
        );
        Ok(())
    }
}

/// Outcome counts for a finished (or aborted) session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub by_status: BTreeMap<OperationStatus, usize>,
    pub by_error: BTreeMap<ErrorType, usize>,
}

impl SessionSummary {
    pub fn count(&self, status: OperationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn errors_of(&self, kind: ErrorType) -> usize {
        self.by_error.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} converted, {} skipped, {} errors",
            self.total,
            self.count(OperationStatus::ConvertedAndRecycled),
            self.count(OperationStatus::Skipped),
            self.count(OperationStatus::Error),
        )?;
        if !self.by_error.is_empty() {
            let detail: Vec<String> = self
                .by_error
                .iter()
                .map(|(kind, n)| format!("{kind}={n}"))
                .collect();
            write!(f, " ({})", detail.join(", "))?;
        }
        Ok(())
    }
}
