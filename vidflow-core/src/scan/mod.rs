//! Scan domain modules.
//!
//! Folder discovery, the start-of-session snapshot, and the live filesystem
//! watch pipeline that feeds newly arriving files into the worker pool.

pub mod fs_watch;
pub mod scanner;
pub mod settings;
pub mod snapshot;

pub use fs_watch::{MediaWatcher, SettlePolicy};
pub use scanner::PathScanner;
pub use settings::{DEFAULT_MEDIA_EXTENSIONS, default_media_extensions_vec};
pub use snapshot::DirectorySnapshot;
