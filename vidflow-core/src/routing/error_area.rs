use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Flat holding directory for originals that could not be converted or
/// recycled.
///
/// Name selection and the move itself happen under one lock so two workers
/// never claim the same free name.
#[derive(Debug)]
pub struct ErrorArea {
    root: PathBuf,
    lock: Mutex<()>,
}

impl ErrorArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move `original` into the error root and return where it landed.
    pub async fn admit(&self, original: &Path) -> io::Result<PathBuf> {
        let file_name = original.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", original.display()),
            )
        })?;

        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.root).await?;

        let mut destination = self.root.join(file_name);
        while tokio::fs::try_exists(&destination).await? {
            let candidate = self.root.join(suffixed_name(original));
            debug!(
                taken = %destination.display(),
                candidate = %candidate.display(),
                "error area name collision"
            );
            destination = candidate;
        }

        move_file(original, &destination).await?;
        info!(
            original = %original.display(),
            destination = %destination.display(),
            "moved original to error area"
        );
        Ok(destination)
    }
}

/// `<stem>_<8 hex chars><.ext>` built from `path`'s file name.
pub(crate) fn suffixed_name(path: &Path) -> OsString {
    let tag = Uuid::new_v4().simple().to_string();
    let mut name = path
        .file_stem()
        .map(OsString::from)
        .unwrap_or_default();
    name.push("_");
    name.push(&tag[..8]);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Rename, falling back to copy + remove when source and destination live on
/// different filesystems.
pub(crate) async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
        Err(err) => Err(err),
    }
}
