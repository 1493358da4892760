use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source folder not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Source path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Encoder unavailable at {}: {reason}", .path.display())]
    EncoderUnavailable { path: PathBuf, reason: String },

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("Worker failure: {0}")]
    Worker(String),

    #[error("Undo log error: {0}")]
    UndoLog(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
