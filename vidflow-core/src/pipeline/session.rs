//! One end-to-end conversion session over a source root.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::context::{PipelineContext, SessionRoots};
use super::ledger::{SessionLedger, SessionSummary};
use super::pool::{PoolConfig, WorkerPool, default_worker_count};
use super::reaper::DirectoryReaper;
use crate::error::{PipelineError, Result};
use crate::routing::{OutcomeRouter, RecyclePolicy, Recycler, UndoLog};
use crate::scan::{
    DirectorySnapshot, MediaWatcher, PathScanner, SettlePolicy,
    default_media_extensions_vec,
};
use crate::transcode::TranscodeEngine;
use crate::types::{EncoderPreset, MediaFile};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const UNDO_LOG_SUFFIX: &str = "_undo.log";
pub const CRASH_LOG_SUFFIX: &str = "_session_log_on_CRITICAL_error.txt";

/// Resolved settings for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub source: PathBuf,
    pub encoder: PathBuf,
    pub preset: EncoderPreset,
    pub media_extensions: Vec<String>,
    pub auto_continue: bool,
    pub batch_size: usize,
    pub parallel: bool,
    pub watch: bool,
    pub all_cores: bool,
    /// Explicit worker count; derived from the core count when `None`.
    pub workers: Option<usize>,
    pub channel_capacity: Option<usize>,
    pub settle: SettlePolicy,
    pub recycle: RecyclePolicy,
    /// Defaults to `<parent>/<source name>_undo.log`.
    pub undo_log: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            encoder: PathBuf::from("ffmpeg"),
            preset: EncoderPreset::default(),
            media_extensions: default_media_extensions_vec(),
            auto_continue: false,
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            watch: false,
            all_cores: false,
            workers: None,
            channel_capacity: None,
            settle: SettlePolicy::default(),
            recycle: RecyclePolicy::default(),
            undo_log: None,
        }
    }

    pub fn mode(&self) -> RunMode {
        if self.watch {
            RunMode::Watch
        } else if self.parallel {
            RunMode::Parallel
        } else {
            RunMode::Sequential
        }
    }

    /// Parallel and watch modes never pause for confirmation.
    pub fn effective_auto_continue(&self) -> bool {
        self.auto_continue || self.parallel || self.watch
    }

    pub fn pool_config(&self) -> PoolConfig {
        let workers = self
            .workers
            .unwrap_or_else(|| default_worker_count(self.all_cores));
        let config = PoolConfig::new(workers);
        match self.channel_capacity {
            Some(capacity) => config.with_capacity(capacity),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sequential,
    Parallel,
    Watch,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Sequential => "sequential",
            RunMode::Parallel => "parallel",
            RunMode::Watch => "watch",
        })
    }
}

/// Where a sequential run stands when it pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based batch number.
    pub batch: usize,
    pub in_batch: usize,
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    Continue,
    Stop,
}

/// Asked after every batch of a sequential, non-auto-continue run.
pub trait BatchGate: Send {
    fn after_batch(&mut self, progress: &BatchProgress) -> BatchDecision;
}

impl<F> BatchGate for F
where
    F: FnMut(&BatchProgress) -> BatchDecision + Send,
{
    fn after_batch(&mut self, progress: &BatchProgress) -> BatchDecision {
        self(progress)
    }
}

/// Gate that never pauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

impl BatchGate for AlwaysContinue {
    fn after_batch(&mut self, _progress: &BatchProgress) -> BatchDecision {
        BatchDecision::Continue
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub mode: RunMode,
    pub roots: SessionRoots,
    pub summary: SessionSummary,
    pub reaped: Vec<PathBuf>,
    pub undo_log: PathBuf,
    /// A batch gate or a cancellation ended the run before every file of
    /// the initial scan was handled.
    pub stopped_early: bool,
}

/// A validated, ready-to-run session.
///
/// Construction performs every check that can fail before any file is
/// touched; [`Session::run`] is the only step that mutates the filesystem.
#[derive(Debug)]
pub struct Session {
    options: SessionOptions,
    ctx: Arc<PipelineContext>,
    snapshot: Arc<DirectorySnapshot>,
    files: Vec<MediaFile>,
    undo_log: PathBuf,
    crash_log: PathBuf,
}

impl Session {
    pub async fn prepare(options: SessionOptions) -> Result<Self> {
        let recycler = options.recycle.build();
        Self::prepare_with_recycler(options, recycler).await
    }

    pub async fn prepare_with_recycler(
        options: SessionOptions,
        recycler: Arc<dyn Recycler>,
    ) -> Result<Self> {
        let source = resolve_source(&options.source).await?;
        let roots = SessionRoots::derive(&source)?;

        let engine = TranscodeEngine::new(&options.encoder);
        engine.probe().await?;

        let scanner =
            PathScanner::new().with_extensions(&options.media_extensions);
        let snapshot = DirectorySnapshot::capture(&source);
        let files = scanner.scan(&source)?;

        let undo_log = options
            .undo_log
            .clone()
            .unwrap_or_else(|| roots.sibling_file(UNDO_LOG_SUFFIX));
        let crash_log = roots.sibling_file(CRASH_LOG_SUFFIX);

        if options.recycle.may_hard_delete() {
            warn!(
                policy = %options.recycle,
                "originals of successful conversions may be deleted permanently"
            );
        }

        let router = OutcomeRouter::new(&roots.errors, recycler)
            .with_undo_log(Arc::new(UndoLog::new(&undo_log)));

        info!(
            source = %roots.source.display(),
            converted = %roots.converted.display(),
            errors = %roots.errors.display(),
            files = files.len(),
            mode = %options.mode(),
            preset = %options.preset,
            "session prepared"
        );

        let ctx = Arc::new(PipelineContext {
            roots,
            preset: options.preset,
            scanner,
            engine,
            router,
            ledger: SessionLedger::new(),
        });

        Ok(Self {
            options,
            ctx,
            snapshot: Arc::new(snapshot),
            files,
            undo_log,
            crash_log,
        })
    }

    pub fn roots(&self) -> &SessionRoots {
        &self.ctx.roots
    }

    /// Media files found by the initial scan.
    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ctx.ledger
    }

    pub fn mode(&self) -> RunMode {
        self.options.mode()
    }

    pub fn crash_log(&self) -> &Path {
        &self.crash_log
    }

    /// Process the initial scan (and live arrivals in watch mode), then reap
    /// empty directories.
    ///
    /// In watch mode the run lasts until `shutdown` is cancelled. In the other
    /// modes cancelling `shutdown` stops dispatching new files; work already
    /// started always finishes.
    pub async fn run(
        self,
        gate: &mut dyn BatchGate,
        shutdown: CancellationToken,
    ) -> Result<SessionReport> {
        let outcome = match self.mode() {
            RunMode::Sequential => self.run_sequential(gate, &shutdown).await,
            RunMode::Parallel => self.run_pooled(&shutdown, false).await,
            RunMode::Watch => self.run_pooled(&shutdown, true).await,
        };

        let stopped_early = match outcome {
            Ok(stopped_early) => stopped_early,
            Err(err) => {
                error!("session aborted: {}", err);
                self.write_crash_log();
                return Err(err);
            }
        };

        let ledger = &self.ctx.ledger;
        let reaped = if ledger.is_empty() {
            Vec::new()
        } else {
            DirectoryReaper.reap(&self.ctx.roots.source, &self.snapshot)
        };

        let summary = ledger.summary();
        info!(%summary, "session finished");
        Ok(SessionReport {
            mode: self.mode(),
            roots: self.ctx.roots.clone(),
            summary,
            reaped,
            undo_log: self.undo_log,
            stopped_early,
        })
    }

    /// Rescan the source right before dispatching, so files that arrived
    /// after `prepare` (or before the watcher was listening) are included.
    fn initial_files(&self) -> Result<Vec<MediaFile>> {
        let files = self.ctx.scanner.scan(&self.ctx.roots.source)?;
        if files.len() != self.files.len() {
            info!(
                prepared = self.files.len(),
                now = files.len(),
                "source changed since the session was prepared"
            );
        }
        self.ctx.ledger.expect(files.len());
        Ok(files)
    }

    async fn run_sequential(
        &self,
        gate: &mut dyn BatchGate,
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        let files = self.initial_files()?;
        let auto_continue = self.options.effective_auto_continue();
        let batch_size = self.options.batch_size.max(1);
        let total = files.len();
        let mut progress = BatchProgress {
            batch: 1,
            in_batch: 0,
            processed: 0,
            total,
        };

        for file in &files {
            if shutdown.is_cancelled() {
                info!(processed = progress.processed, "interrupted");
                return Ok(true);
            }
            let task = self.ctx.task_for(file.path.clone());
            self.ctx.process(&task).await;
            progress.in_batch += 1;
            progress.processed += 1;

            let batch_full = progress.in_batch >= batch_size;
            let last = progress.processed == total;
            if !auto_continue && (batch_full || last) {
                info!(
                    batch = progress.batch,
                    files = progress.in_batch,
                    processed = progress.processed,
                    total,
                    "batch complete"
                );
                if gate.after_batch(&progress) == BatchDecision::Stop {
                    info!("stopping at user request");
                    return Ok(!last);
                }
                progress.batch += 1;
                progress.in_batch = 0;
            }
        }
        Ok(false)
    }

    async fn run_pooled(
        &self,
        shutdown: &CancellationToken,
        watch: bool,
    ) -> Result<bool> {
        let pool = WorkerPool::start(Arc::clone(&self.ctx), self.options.pool_config());

        let watcher = if watch {
            match MediaWatcher::start(
                Arc::clone(&self.ctx),
                pool.submitter(),
                Arc::clone(&self.snapshot),
                self.options.settle,
                shutdown,
            ) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    pool.shutdown().await?;
                    return Err(err);
                }
            }
        } else {
            None
        };

        let fed = match self.initial_files() {
            Ok(files) => self.feed_initial(&pool, &files, shutdown).await,
            Err(err) => Err(err),
        };

        if let Some(watcher) = watcher {
            if let Ok(false) = fed {
                info!("initial batch queued; waiting for new files (Ctrl+C to stop)");
                shutdown.cancelled().await;
            }
            watcher.stop().await;
        }

        let drained = pool.shutdown().await;
        let interrupted = fed?;
        drained?;
        Ok(interrupted && !watch)
    }

    /// Queue every file of the initial scan. Returns `true` when cancelled
    /// before the last one was queued.
    async fn feed_initial(
        &self,
        pool: &WorkerPool,
        files: &[MediaFile],
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        let submitter = pool.submitter();
        for file in files {
            let task = self.ctx.task_for(file.path.clone());
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("interrupted while queueing the initial batch");
                    return Ok(true);
                }
                queued = submitter.submit(task) => {
                    if !queued? {
                        // Already accepted from a watcher arrival and
                        // counted there.
                        self.ctx.ledger.retract(1);
                    }
                }
            }
        }
        Ok(false)
    }

    fn write_crash_log(&self) {
        if self.ctx.ledger.is_empty() {
            return;
        }
        match self.ctx.ledger.flush_to(&self.crash_log) {
            Ok(()) => warn!(
                path = %self.crash_log.display(),
                "session ledger saved after fatal error"
            ),
            Err(err) => error!(
                path = %self.crash_log.display(),
                "could not save session ledger: {}",
                err
            ),
        }
    }
}

async fn resolve_source(source: &Path) -> Result<PathBuf> {
    let resolved = match tokio::fs::canonicalize(source).await {
        Ok(resolved) => resolved,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::SourceMissing(source.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    if !resolved.is_dir() {
        return Err(PipelineError::NotADirectory(resolved));
    }
    Ok(resolved)
}
