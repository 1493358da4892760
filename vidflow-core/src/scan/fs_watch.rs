//! Live watch mode.
//!
//! A recursive `notify` watcher forwards raw events into a bounded channel.
//! The watch loop classifies them, waits for each arrival to settle and then
//! hands conversion tasks to the worker pool. The watcher only produces
//! tasks; it never converts anything itself.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, EventKind, ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::snapshot::DirectorySnapshot;
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineContext, TaskSubmitter};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// When a newly arrived file counts as complete.
///
/// After the fixed `settle_delay` the file size is polled every
/// `poll_interval` until it stays unchanged for `stable_checks` consecutive
/// polls. `stable_checks == 0` keeps the plain fixed delay. A file that never
/// settles within `max_settle_polls` is submitted anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub stable_checks: u32,
    pub max_settle_polls: u32,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(250),
            stable_checks: 2,
            max_settle_polls: 40,
        }
    }
}

impl SettlePolicy {
    /// Fixed delay only, no size polling.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            settle_delay: delay,
            stable_checks: 0,
            ..Self::default()
        }
    }

    /// Wait for `path` to settle. Returns `false` if it disappeared.
    pub async fn settle(&self, path: &Path) -> bool {
        tokio::time::sleep(self.settle_delay).await;
        self.wait_stable(path).await
    }

    /// Size-stability polling without the initial delay.
    pub async fn wait_stable(&self, path: &Path) -> bool {
        let Some(mut last) = file_size(path).await else {
            return false;
        };
        if self.stable_checks == 0 {
            return true;
        }
        let mut stable = 0;
        for _ in 0..self.max_settle_polls {
            tokio::time::sleep(self.poll_interval).await;
            let Some(size) = file_size(path).await else {
                return false;
            };
            if size == last {
                stable += 1;
                if stable >= self.stable_checks {
                    return true;
                }
            } else {
                stable = 0;
                last = size;
            }
        }
        warn!(
            path = %path.display(),
            polls = self.max_settle_polls,
            "file still changing; submitting anyway"
        );
        true
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => f
                .debug_struct("WatchMessage::Event")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
        }
    }
}

/// What the loop does with one arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arrival {
    File(PathBuf),
    Directory(PathBuf),
}

/// Running watcher over the session's source root.
pub struct MediaWatcher {
    watcher: RecommendedWatcher,
    token: CancellationToken,
    watch_loop: JoinHandle<()>,
}

impl fmt::Debug for MediaWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaWatcher")
            .field("cancelled", &self.token.is_cancelled())
            .field("loop_finished", &self.watch_loop.is_finished())
            .finish()
    }
}

impl MediaWatcher {
    /// Start watching `ctx.roots.source`. Cancelling `parent` has the same
    /// effect on pending settle tasks as [`MediaWatcher::stop`].
    pub fn start(
        ctx: Arc<PipelineContext>,
        submitter: TaskSubmitter,
        snapshot: Arc<DirectorySnapshot>,
        policy: SettlePolicy,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let root = ctx.roots.source.clone();
        let (tx, rx) = mpsc::channel::<WatchMessage>(EVENT_CHANNEL_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                let msg = match res {
                    Ok(event) => WatchMessage::Event(event),
                    Err(err) => WatchMessage::Error(err.to_string()),
                };
                if let Err(err) = tx.blocking_send(msg) {
                    debug!("watch channel closed: {}", err);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|err| {
            PipelineError::Watch(format!("failed to create watcher: {err}"))
        })?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|err| {
                PipelineError::Watch(format!(
                    "failed to watch {}: {}",
                    root.display(),
                    err
                ))
            })?;

        let token = parent.child_token();
        let watch_loop = tokio::spawn(run_watch_loop(
            rx,
            ctx,
            submitter,
            snapshot,
            policy,
            token.clone(),
        ));

        info!(root = %root.display(), "watching for new media");
        Ok(Self {
            watcher,
            token,
            watch_loop,
        })
    }

    /// Stop producing tasks. Pending settle tasks are cancelled; tasks that
    /// already reached the pool are left to the pool's drain.
    pub async fn stop(self) {
        self.token.cancel();
        drop(self.watcher);
        if let Err(err) = self.watch_loop.await {
            warn!("watch loop ended abnormally: {}", err);
        }
        info!("watcher stopped");
    }
}

async fn run_watch_loop(
    mut rx: mpsc::Receiver<WatchMessage>,
    ctx: Arc<PipelineContext>,
    submitter: TaskSubmitter,
    snapshot: Arc<DirectorySnapshot>,
    policy: SettlePolicy,
    token: CancellationToken,
) {
    let mut settling = JoinSet::new();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            Some(_) = settling.join_next(), if !settling.is_empty() => {}
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    WatchMessage::Event(event) => {
                        for arrival in classify(&event) {
                            if let Arrival::File(path) = &arrival
                                && !ctx.scanner.is_media(path)
                            {
                                continue;
                            }
                            debug!(?arrival, "new arrival");
                            settling.spawn(settle_and_submit(
                                arrival,
                                Arc::clone(&ctx),
                                submitter.clone(),
                                Arc::clone(&snapshot),
                                policy,
                                token.clone(),
                            ));
                        }
                    }
                    WatchMessage::Error(err) => warn!("watch error: {}", err),
                }
            }
        }
    }
    drop(rx);
    settling.shutdown().await;
}

fn classify(event: &Event) -> Vec<Arrival> {
    let candidates: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::Folder) => {
            return event
                .paths
                .iter()
                .cloned()
                .map(Arrival::Directory)
                .collect();
        }
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|path| path.exists())
            .collect(),
        _ => Vec::new(),
    };
    candidates
        .into_iter()
        .map(|path| {
            if path.is_dir() {
                Arrival::Directory(path.clone())
            } else {
                Arrival::File(path.clone())
            }
        })
        .collect()
}

async fn settle_and_submit(
    arrival: Arrival,
    ctx: Arc<PipelineContext>,
    submitter: TaskSubmitter,
    snapshot: Arc<DirectorySnapshot>,
    policy: SettlePolicy,
    token: CancellationToken,
) {
    let work = async {
        match arrival {
            Arrival::File(path) => {
                if policy.settle(&path).await {
                    submit(&ctx, &submitter, path).await;
                } else {
                    debug!(path = %path.display(), "arrival vanished before settling");
                }
            }
            Arrival::Directory(dir) => {
                tokio::time::sleep(policy.settle_delay).await;
                rescan_directory(&ctx, &submitter, &snapshot, &policy, &dir).await;
            }
        }
    };
    tokio::select! {
        _ = token.cancelled() => {}
        _ = work => {}
    }
}

async fn rescan_directory(
    ctx: &PipelineContext,
    submitter: &TaskSubmitter,
    snapshot: &DirectorySnapshot,
    policy: &SettlePolicy,
    dir: &Path,
) {
    let scanner = ctx.scanner.clone();
    let target = dir.to_path_buf();
    let found = match tokio::task::spawn_blocking(move || scanner.scan(&target)).await
    {
        Ok(Ok(found)) => found,
        Ok(Err(err)) => {
            warn!(dir = %dir.display(), "rescan failed: {}", err);
            return;
        }
        Err(err) => {
            warn!(dir = %dir.display(), "rescan task failed: {}", err);
            return;
        }
    };
    info!(dir = %dir.display(), files = found.len(), "rescanning new directory");
    for file in found {
        if snapshot.contains_file(&file.path) {
            continue;
        }
        if policy.wait_stable(&file.path).await {
            submit(ctx, submitter, file.path).await;
        }
    }
}

async fn submit(ctx: &PipelineContext, submitter: &TaskSubmitter, path: PathBuf) {
    let task = ctx.task_for(path);
    match submitter.submit(task).await {
        Ok(true) => ctx.ledger.expect(1),
        Ok(false) => {}
        Err(err) => debug!("dropping arrival: {}", err),
    }
}
