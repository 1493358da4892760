use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories and files present under the source root when a session
/// starts. Captured once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    root: PathBuf,
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

impl DirectorySnapshot {
    /// Walk `root` and record every directory and regular file below it
    /// (the root itself included in `dirs`).
    pub fn capture(root: &Path) -> Self {
        let mut dirs = HashSet::new();
        let mut files = HashSet::new();
        for entry in WalkDir::new(root) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    dirs.insert(entry.into_path());
                }
                Ok(entry) if entry.file_type().is_file() => {
                    files.insert(entry.into_path());
                }
                Ok(_) => {}
                Err(err) => warn!("snapshot skipped entry: {}", err),
            }
        }
        debug!(
            root = %root.display(),
            dirs = dirs.len(),
            files = files.len(),
            "captured directory snapshot"
        );
        Self {
            root: root.to_path_buf(),
            dirs,
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }
}
