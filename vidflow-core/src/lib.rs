//! # vidflow core
//!
//! Folder-watching media conversion pipeline. Files discovered under a source
//! root are re-encoded into a sibling `<name>_converted` tree by an external
//! encoder; originals of successful conversions are recycled, failures are
//! parked flat in `<name>_errors`, and every outcome lands in a session
//! ledger.
//!
//! ## Architecture
//!
//! - [`scan`]: one-shot tree walk, start-of-session snapshot and the live
//!   watcher
//! - [`transcode`]: encoder probe and per-file subprocess invocation
//! - [`routing`]: recycle / quarantine decisions and the undo log
//! - [`pipeline`]: worker pool, ledger, reaper and the [`Session`] driver
//!
//! ## Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use vidflow_core::{AlwaysContinue, Session, SessionOptions};
//!
//! async fn convert_all() -> vidflow_core::Result<()> {
//!     let mut options = SessionOptions::new("/data/raw");
//!     options.parallel = true;
//!
//!     let session = Session::prepare(options).await?;
//!     let report = session
//!         .run(&mut AlwaysContinue, CancellationToken::new())
//!         .await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]

pub mod error;
pub mod pipeline;
pub mod record;
pub mod routing;
pub mod scan;
pub mod transcode;
pub mod types;

pub use error::{PipelineError, Result};
pub use pipeline::{
    AlwaysContinue, BatchDecision, BatchGate, BatchProgress, Progress, RunMode,
    Session, SessionLedger, SessionOptions, SessionReport, SessionRoots,
    SessionSummary,
};
pub use record::{
    ErrorType, OperationRecord, OperationStatus, Outcome, SkipReason,
};
pub use routing::{RecyclePolicy, UndoEntry, UndoLog};
pub use scan::{DEFAULT_MEDIA_EXTENSIONS, SettlePolicy};
pub use transcode::TranscodeEngine;
pub use types::{CONVERTED_EXTENSION, ConversionTask, EncoderPreset, MediaFile};
