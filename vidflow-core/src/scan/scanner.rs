use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::settings::default_media_extensions_vec;
use crate::error::{PipelineError, Result};
use crate::types::{MediaFile, normalized_extension};

/// Walks a source tree once and returns every file on the allow-list.
#[derive(Debug, Clone)]
pub struct PathScanner {
    /// Lowercase extensions (no dot) treated as convertible media.
    pub media_extensions: Vec<String>,
    /// Whether to follow symbolic links
    pub follow_links: bool,
}

impl Default for PathScanner {
    fn default() -> Self {
        Self {
            media_extensions: default_media_extensions_vec(),
            follow_links: false,
        }
    }
}

impl PathScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allow-list. Entries are normalized the same way file
    /// extensions are, so `".MOV "` and `"mov"` are equivalent.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.media_extensions = extensions
            .into_iter()
            .map(|ext| {
                ext.as_ref().trim().trim_start_matches('.').to_lowercase()
            })
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Check whether `path` carries an allow-listed extension.
    pub fn is_media(&self, path: &Path) -> bool {
        normalized_extension(path)
            .is_some_and(|ext| self.media_extensions.contains(&ext))
    }

    /// Enumerate every media file under `root`.
    ///
    /// A missing or unreadable root is an error; unreadable entries below the
    /// root are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<Vec<MediaFile>> {
        if !root.exists() {
            return Err(PipelineError::SourceMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(PipelineError::NotADirectory(root.to_path_buf()));
        }
        // Surface permission problems on the root itself instead of
        // reporting an empty tree.
        std::fs::read_dir(root)?;

        info!(
            root = %root.display(),
            extensions = ?self.media_extensions,
            "scanning for media files"
        );

        let mut files = Vec::new();
        let mut checked = 0usize;
        for entry in WalkDir::new(root).follow_links(self.follow_links) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            checked += 1;
            if let Some(file) = self.accept(root, &entry) {
                files.push(file);
            }
        }

        info!(
            root = %root.display(),
            checked,
            matched = files.len(),
            "scan complete"
        );
        Ok(files)
    }

    fn accept(&self, root: &Path, entry: &DirEntry) -> Option<MediaFile> {
        let path = entry.path();
        if !self.is_media(path) {
            debug!(path = %path.display(), "ignoring non-media file");
            return None;
        }
        MediaFile::new(root, path)
    }
}
