#![cfg(unix)]

mod common;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::{options, touch, wait_for};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vidflow_core::routing::{Recycler, RefusingRecycler};
use vidflow_core::{
    AlwaysContinue, BatchDecision, BatchProgress, ErrorType, OperationRecord,
    OperationStatus, Outcome, PipelineError, Progress, RunMode, Session,
    UndoLog,
};

fn source_tree(tmp: &TempDir) -> PathBuf {
    let source = tmp.path().join("raw");
    touch(&source.join("a/video.mov"));
    touch(&source.join("b/clip.avi"));
    touch(&source.join("c/notes.txt"));
    source
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_run_converts_and_recycles_everything() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("a/video.mov"));
    touch(&source.join("b/clip.mkv"));
    touch(&source.join("c/notes.txt"));

    let mut options = options(tmp.path(), &source);
    options.parallel = true;
    let session = Session::prepare(options).await.unwrap();
    assert_eq!(session.files().len(), 2);
    let roots = session.roots().clone();
    let ledger = session.ledger().clone();

    let report = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.mode, RunMode::Parallel);
    assert_eq!(report.summary.total, 2);
    assert_eq!(
        report.summary.count(OperationStatus::ConvertedAndRecycled),
        2
    );
    assert!(roots.converted.join("a/video.mp4").is_file());
    assert!(roots.converted.join("b/clip.mp4").is_file());
    assert!(!roots.source.join("a/video.mov").exists());
    assert!(!roots.source.join("b/clip.mkv").exists());
    assert!(roots.source.join("c/notes.txt").exists());
    // `a` and `b` existed before the run, so they survive even though empty.
    assert!(roots.source.join("a").is_dir());
    assert!(roots.source.join("b").is_dir());
    assert!(roots.source.join("c").is_dir());
    assert!(report.reaped.is_empty());
    assert!(!roots.errors.exists());
    assert_eq!(ledger.progress(), Progress { completed: 2, total: 2 });
}

#[tokio::test]
async fn failed_conversion_is_quarantined_and_undoable() {
    let tmp = TempDir::new().unwrap();
    let source = source_tree(&tmp);

    let session = Session::prepare(options(tmp.path(), &source)).await.unwrap();
    let roots = session.roots().clone();
    let ledger = session.ledger().clone();

    let report = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.mode, RunMode::Sequential);
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.errors_of(ErrorType::ConversionFailed), 1);

    let quarantined = roots.errors.join("clip.avi");
    assert!(quarantined.is_file());
    assert!(!roots.converted.join("b/clip.mp4").exists());
    assert!(roots.converted.join("a/video.mp4").is_file());
    assert!(!roots.source.join("a/video.mov").exists());

    let records = ledger.records();
    let failed = records
        .iter()
        .find(|r| r.original == roots.source.join("b/clip.avi"))
        .unwrap();
    assert_eq!(
        failed.outcome,
        Outcome::Error {
            error_type: ErrorType::ConversionFailed,
            moved_to: Some(quarantined.clone()),
        }
    );
    assert!(
        records
            .iter()
            .all(|r| r.original != roots.source.join("c/notes.txt"))
    );

    let undo = UndoLog::new(&report.undo_log);
    let entry = undo.undo_last().await.unwrap().unwrap();
    assert_eq!(entry.destination, quarantined);
    assert!(roots.source.join("b/clip.avi").is_file());
    assert!(!quarantined.exists());
    assert!(undo.undo_last().await.unwrap().is_none());
}

#[tokio::test]
async fn error_area_collisions_get_unique_names() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("one/clip.avi"));
    touch(&source.join("two/clip.avi"));
    let errors = tmp.path().join("raw_errors");
    fs::create_dir_all(&errors).unwrap();
    fs::write(errors.join("clip.avi"), b"already here").unwrap();

    let session = Session::prepare(options(tmp.path(), &source)).await.unwrap();
    let roots = session.roots().clone();
    let ledger = session.ledger().clone();
    session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        fs::read(roots.errors.join("clip.avi")).unwrap(),
        b"already here"
    );
    let destinations: HashSet<PathBuf> = ledger
        .records()
        .iter()
        .filter_map(|r| r.destination().map(PathBuf::from))
        .collect();
    assert_eq!(destinations.len(), 2);
    for dest in &destinations {
        assert!(dest.is_file());
        assert_eq!(dest.parent(), Some(roots.errors.as_path()));
        let name = dest.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("clip_") && name.ends_with(".avi"), "{name}");
    }
    assert_eq!(fs::read_dir(&roots.errors).unwrap().count(), 3);
}

#[tokio::test]
async fn interrupted_run_resumes_with_remaining_files_only() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    for name in ["a.mov", "b.mov", "c.mov", "d.mov"] {
        touch(&source.join("in").join(name));
    }

    let mut first = options(tmp.path(), &source);
    first.auto_continue = false;
    first.batch_size = 1;
    let session = Session::prepare(first).await.unwrap();
    let ledger = session.ledger().clone();
    let mut stop_now = |_: &BatchProgress| BatchDecision::Stop;
    let report = session
        .run(&mut stop_now, CancellationToken::new())
        .await
        .unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.summary.total, 1);
    let done: HashSet<PathBuf> =
        ledger.records().into_iter().map(|r| r.original).collect();

    let session = Session::prepare(options(tmp.path(), &source)).await.unwrap();
    assert_eq!(session.files().len(), 3);
    let ledger = session.ledger().clone();
    let report = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.stopped_early);
    assert_eq!(
        report.summary.count(OperationStatus::ConvertedAndRecycled),
        3
    );
    assert!(ledger.records().iter().all(|r| !done.contains(&r.original)));
    assert_eq!(fs::read_dir(report.roots.converted.join("in")).unwrap().count(), 4);
}

#[tokio::test]
async fn batch_gate_sees_every_batch_boundary() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    for name in ["a.mov", "b.mov", "c.mov"] {
        touch(&source.join(name));
    }
    let mut options = options(tmp.path(), &source);
    options.auto_continue = false;
    options.batch_size = 2;

    let mut seen = Vec::new();
    let mut gate = |progress: &BatchProgress| {
        seen.push(*progress);
        BatchDecision::Continue
    };
    let report = Session::prepare(options)
        .await
        .unwrap()
        .run(&mut gate, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 3);
    assert!(!report.stopped_early);
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].batch, seen[0].in_batch, seen[0].processed), (1, 2, 2));
    assert_eq!((seen[1].batch, seen[1].in_batch, seen[1].processed), (2, 1, 3));
}

#[tokio::test]
async fn refused_recycle_moves_original_and_drops_output() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("x/video.webm"));

    let session = Session::prepare_with_recycler(
        options(tmp.path(), &source),
        Arc::new(RefusingRecycler::default()),
    )
    .await
    .unwrap();
    let roots = session.roots().clone();
    let report = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.errors_of(ErrorType::RecyclingFailed), 1);
    assert!(roots.errors.join("video.webm").is_file());
    assert!(!roots.converted.join("x/video.mp4").exists());
    assert!(!roots.source.join("x/video.webm").exists());
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let source = source_tree(&tmp);
    let token = CancellationToken::new();
    token.cancel();

    let mut options = options(tmp.path(), &source);
    options.parallel = true;
    let report = Session::prepare(options)
        .await
        .unwrap()
        .run(&mut AlwaysContinue, token)
        .await
        .unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.summary.total, 0);
    assert!(report.reaped.is_empty());
    assert!(source.join("a/video.mov").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn watch_mode_picks_up_new_folders_and_reaps_them() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("seed/first.mov"));
    fs::create_dir_all(source.join("keep_me")).unwrap();

    let mut options = options(tmp.path(), &source);
    options.watch = true;
    let session = Session::prepare(options).await.unwrap();
    let roots = session.roots().clone();
    let ledger = session.ledger().clone();

    let token = CancellationToken::new();
    let run = tokio::spawn({
        let token = token.clone();
        async move { session.run(&mut AlwaysContinue, token).await }
    });

    assert!(
        wait_for(&roots.converted.join("seed/first.mp4"), Duration::from_secs(10))
            .await
    );

    // Stage outside the watched tree, then move the whole folder in.
    let staging = tmp.path().join("staging/incoming");
    touch(&staging.join("later.mov"));
    fs::rename(&staging, roots.source.join("incoming")).unwrap();

    let converted = roots.converted.join("incoming/later.mp4");
    assert!(wait_for(&converted, Duration::from_secs(10)).await);
    // Give routing a moment to recycle the original.
    let original = roots.source.join("incoming/later.mov");
    for _ in 0..200 {
        if !original.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    token.cancel();
    let report = run.await.unwrap().unwrap();

    assert_eq!(report.mode, RunMode::Watch);
    assert_eq!(
        report.summary.count(OperationStatus::ConvertedAndRecycled),
        2
    );
    assert!(
        ledger
            .records()
            .iter()
            .all(|r| r.status() != OperationStatus::Error)
    );
    assert!(report.reaped.contains(&roots.source.join("incoming")));
    assert!(!roots.source.join("incoming").exists());
    assert!(roots.source.join("keep_me").is_dir());
    assert!(roots.source.join("seed").is_dir());
    // Arrivals are added to the total as the watcher accepts them.
    let progress = ledger.progress();
    assert!(progress.total >= 2);
    assert_eq!(progress.completed, progress.total);
}

#[tokio::test]
async fn files_added_after_prepare_are_included() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("early.mov"));

    let session = Session::prepare(options(tmp.path(), &source)).await.unwrap();
    assert_eq!(session.files().len(), 1);
    touch(&source.join("late/late.mkv"));

    let roots = session.roots().clone();
    let report = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.summary.count(OperationStatus::ConvertedAndRecycled),
        2
    );
    assert!(roots.converted.join("late/late.mp4").is_file());
}

#[tokio::test]
async fn source_removed_before_run_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("a.mov"));

    let session = Session::prepare(options(tmp.path(), &source)).await.unwrap();
    let crash_log = session.crash_log().to_path_buf();
    fs::remove_dir_all(&source).unwrap();

    let err = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SourceMissing(_)), "{err}");
    // Nothing was processed, so there is nothing to save.
    assert!(!crash_log.exists());
}

/// Recycler that crashes the worker handling one particular original.
#[derive(Debug)]
struct CrashesOn(PathBuf);

#[async_trait::async_trait]
impl Recycler for CrashesOn {
    async fn recycle(&self, path: &Path) -> std::io::Result<()> {
        if path == self.0 {
            panic!("recycler crashed on {}", path.display());
        }
        tokio::fs::remove_file(path).await
    }

    fn label(&self) -> &'static str {
        "crashes-on"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fatal_worker_failure_saves_ledger_to_crash_log() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("raw");
    touch(&source.join("fine.mov"));
    touch(&source.join("doomed.mov"));
    let canonical = fs::canonicalize(&source).unwrap();

    let mut options = options(tmp.path(), &source);
    options.parallel = true;
    let session = Session::prepare_with_recycler(
        options,
        Arc::new(CrashesOn(canonical.join("doomed.mov"))),
    )
    .await
    .unwrap();
    let crash_log = session.crash_log().to_path_buf();
    assert_eq!(
        crash_log,
        canonical
            .parent()
            .unwrap()
            .join("raw_session_log_on_CRITICAL_error.txt")
    );

    let err = session
        .run(&mut AlwaysContinue, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Worker(_)), "{err}");

    let saved = fs::read_to_string(&crash_log).unwrap();
    let records: Vec<OperationRecord> = saved
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original, canonical.join("fine.mov"));
    assert_eq!(records[0].status(), OperationStatus::ConvertedAndRecycled);
}
