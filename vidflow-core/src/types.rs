//! Core value types shared by the scanner, engine, router and watcher.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extension every converted artifact carries.
pub const CONVERTED_EXTENSION: &str = "mp4";

/// A source artifact discovered under a scan root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path of the original file.
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
    /// Lowercase extension without the leading dot.
    pub extension: String,
}

impl MediaFile {
    /// Build a `MediaFile` for `path` discovered under `root`.
    ///
    /// Returns `None` when `path` is not inside `root` or carries no
    /// extension.
    pub fn new(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        let extension = normalized_extension(path)?;
        Some(Self {
            path: path.to_path_buf(),
            relative,
            extension,
        })
    }
}

/// Lowercase, trimmed extension of `path`, if any.
pub fn normalized_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.trim().to_lowercase();
    if ext.is_empty() { None } else { Some(ext) }
}

/// Encoder speed/quality trade-off passed straight through to ffmpeg.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl EncoderPreset {
    pub const ALL: [EncoderPreset; 9] = [
        EncoderPreset::Ultrafast,
        EncoderPreset::Superfast,
        EncoderPreset::Veryfast,
        EncoderPreset::Faster,
        EncoderPreset::Fast,
        EncoderPreset::Medium,
        EncoderPreset::Slow,
        EncoderPreset::Slower,
        EncoderPreset::Veryslow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderPreset::Ultrafast => "ultrafast",
            EncoderPreset::Superfast => "superfast",
            EncoderPreset::Veryfast => "veryfast",
            EncoderPreset::Faster => "faster",
            EncoderPreset::Fast => "fast",
            EncoderPreset::Medium => "medium",
            EncoderPreset::Slow => "slow",
            EncoderPreset::Slower => "slower",
            EncoderPreset::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for EncoderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown encoder preset '{0}'")]
pub struct UnknownPreset(pub String);

impl FromStr for EncoderPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        EncoderPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == needle)
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// One unit of work: convert `original` and route it afterwards.
///
/// Created once per discovered file and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub original: PathBuf,
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub error_root: PathBuf,
    pub preset: EncoderPreset,
}

impl ConversionTask {
    /// Path of `original` relative to the source root. Falls back to the
    /// file name when the original sits outside the root.
    pub fn relative_path(&self) -> PathBuf {
        match self.original.strip_prefix(&self.source_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => self
                .original
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }

    /// Destination of the converted artifact: the output root joined with the
    /// relative source path, extension replaced.
    pub fn output_path(&self) -> PathBuf {
        self.output_root
            .join(self.relative_path())
            .with_extension(CONVERTED_EXTENSION)
    }
}
