//! Session orchestration: shared context, worker pool, ledger and reaper.

pub mod context;
pub mod ledger;
pub mod pool;
pub mod reaper;
pub mod session;

pub use context::{PipelineContext, SessionRoots};
pub use ledger::{Progress, SessionLedger, SessionSummary};
pub use pool::{
    PoolConfig, PoolStatus, TaskSubmitter, WorkerPool, default_worker_count,
};
pub use reaper::DirectoryReaper;
pub use session::{
    AlwaysContinue, BatchDecision, BatchGate, BatchProgress, RunMode, Session,
    SessionOptions, SessionReport,
};
