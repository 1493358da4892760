//! Per-task outcome records appended to the session ledger.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse status of a finished task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Skipped,
    ConvertedAndRecycled,
    Error,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Skipped => "skipped",
            OperationStatus::ConvertedAndRecycled => "converted_and_recycled",
            OperationStatus::Error => "error",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task did not reach `converted_and_recycled`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    FileNotFound,
    ConversionFailed,
    RecyclingFailed,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::FileNotFound => "file_not_found",
            ErrorType::ConversionFailed => "conversion_failed",
            ErrorType::RecyclingFailed => "recycling_failed",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task was skipped without running the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FileNotFound,
}

impl From<SkipReason> for ErrorType {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::FileNotFound => ErrorType::FileNotFound,
        }
    }
}

/// Terminal outcome of one conversion task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The original vanished before a worker picked it up.
    Skipped { reason: SkipReason },
    /// Output written and the original soft-deleted.
    ConvertedAndRecycled { output: PathBuf },
    /// The original was (or should have been) moved into the error area.
    /// `moved_to` is `None` when that move failed too.
    Error {
        error_type: ErrorType,
        moved_to: Option<PathBuf>,
    },
}

/// Immutable record of a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub original: PathBuf,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OperationRecord {
    fn new(original: &Path, outcome: Outcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            original: original.to_path_buf(),
            timestamp: Utc::now(),
            outcome,
        }
    }

    pub fn skipped(original: &Path) -> Self {
        Self::new(
            original,
            Outcome::Skipped {
                reason: SkipReason::FileNotFound,
            },
        )
    }

    pub fn converted(original: &Path, output: PathBuf) -> Self {
        Self::new(original, Outcome::ConvertedAndRecycled { output })
    }

    pub fn failed(
        original: &Path,
        error_type: ErrorType,
        moved_to: Option<PathBuf>,
    ) -> Self {
        Self::new(
            original,
            Outcome::Error {
                error_type,
                moved_to,
            },
        )
    }

    pub fn status(&self) -> OperationStatus {
        match self.outcome {
            Outcome::Skipped { .. } => OperationStatus::Skipped,
            Outcome::ConvertedAndRecycled { .. } => {
                OperationStatus::ConvertedAndRecycled
            }
            Outcome::Error { .. } => OperationStatus::Error,
        }
    }

    pub fn error_type(&self) -> Option<ErrorType> {
        match self.outcome {
            Outcome::Skipped { reason } => Some(reason.into()),
            Outcome::ConvertedAndRecycled { .. } => None,
            Outcome::Error { error_type, .. } => Some(error_type),
        }
    }

    /// Converted output path or error-area destination, whichever applies.
    pub fn destination(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Skipped { .. } => None,
            Outcome::ConvertedAndRecycled { output } => Some(output),
            Outcome::Error { moved_to, .. } => moved_to.as_deref(),
        }
    }
}
