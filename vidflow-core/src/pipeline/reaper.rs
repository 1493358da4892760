use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::scan::DirectorySnapshot;

/// Removes directories that became empty during the session.
///
/// A directory is removed only if it is empty, is not the root and was not
/// present in the start-of-session snapshot. Children are visited before
/// their parents, so nested chains collapse in one pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryReaper;

impl DirectoryReaper {
    pub fn reap(&self, root: &Path, snapshot: &DirectorySnapshot) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("reaper skipped entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            if snapshot.contains_dir(dir) {
                continue;
            }
            match is_empty_dir(dir) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(dir = %dir.display(), "cannot inspect directory: {}", err);
                    continue;
                }
            }
            match std::fs::remove_dir(dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "removed empty directory");
                    removed.push(dir.to_path_buf());
                }
                Err(err) => {
                    warn!(dir = %dir.display(), "failed to remove directory: {}", err)
                }
            }
        }
        if !removed.is_empty() {
            info!(
                root = %root.display(),
                removed = removed.len(),
                "reaped empty directories"
            );
        }
        removed
    }
}

fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_none())
}
