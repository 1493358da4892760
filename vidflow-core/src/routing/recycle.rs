//! Soft-delete seam used on the success path.
//!
//! Whether a missing platform trash may degrade into a permanent delete is an
//! explicit [`RecyclePolicy`], never an implicit substitution.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Removes an original after its conversion succeeded.
#[async_trait]
pub trait Recycler: Send + Sync + fmt::Debug {
    async fn recycle(&self, path: &Path) -> io::Result<()>;

    /// Short label used in logs and the session summary.
    fn label(&self) -> &'static str;
}

/// Moves files into the platform trash / recycle bin.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

#[async_trait]
impl Recycler for SystemTrash {
    async fn recycle(&self, path: &Path) -> io::Result<()> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || trash::delete(&owned))
            .await
            .map_err(io::Error::other)?
            .map_err(io::Error::other)
    }

    fn label(&self) -> &'static str {
        "trash"
    }
}

/// Permanently deletes files.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardDelete;

#[async_trait]
impl Recycler for HardDelete {
    async fn recycle(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    fn label(&self) -> &'static str {
        "delete"
    }
}

/// Tries the platform trash first and permanently deletes when the trash
/// refuses the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrashOrDelete;

#[async_trait]
impl Recycler for TrashOrDelete {
    async fn recycle(&self, path: &Path) -> io::Result<()> {
        match SystemTrash.recycle(path).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    "trash unavailable ({}); deleting permanently",
                    err
                );
                HardDelete.recycle(path).await
            }
        }
    }

    fn label(&self) -> &'static str {
        "trash-or-delete"
    }
}

/// How originals of successful conversions are retired.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RecyclePolicy {
    /// Platform trash only; a refused trash counts as a recycling failure.
    #[default]
    Trash,
    /// Permanent deletion.
    Delete,
    /// Platform trash, permanent deletion when the trash refuses.
    TrashOrDelete,
}

impl RecyclePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecyclePolicy::Trash => "trash",
            RecyclePolicy::Delete => "delete",
            RecyclePolicy::TrashOrDelete => "trash-or-delete",
        }
    }

    /// Whether the policy can lose data permanently.
    pub fn may_hard_delete(&self) -> bool {
        !matches!(self, RecyclePolicy::Trash)
    }

    pub fn build(&self) -> Arc<dyn Recycler> {
        match self {
            RecyclePolicy::Trash => Arc::new(SystemTrash),
            RecyclePolicy::Delete => Arc::new(HardDelete),
            RecyclePolicy::TrashOrDelete => Arc::new(TrashOrDelete),
        }
    }
}

impl fmt::Display for RecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recycle policy '{0}'")]
pub struct UnknownRecyclePolicy(pub String);

impl FromStr for RecyclePolicy {
    type Err = UnknownRecyclePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "trash" => Ok(RecyclePolicy::Trash),
            "delete" => Ok(RecyclePolicy::Delete),
            "trash-or-delete" => Ok(RecyclePolicy::TrashOrDelete),
            _ => Err(UnknownRecyclePolicy(s.to_string())),
        }
    }
}

/// Recycler that always refuses. Handy for exercising the
/// `recycling_failed` branch.
#[derive(Debug, Clone, Default)]
pub struct RefusingRecycler {
    /// Paths that are refused; empty refuses everything.
    pub only: Vec<PathBuf>,
}

#[async_trait]
impl Recycler for RefusingRecycler {
    async fn recycle(&self, path: &Path) -> io::Result<()> {
        if self.only.is_empty() || self.only.iter().any(|p| p == path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "recycle refused",
            ));
        }
        HardDelete.recycle(path).await
    }

    fn label(&self) -> &'static str {
        "refusing"
    }
}
