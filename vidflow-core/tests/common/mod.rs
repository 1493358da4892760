#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vidflow_core::{RecyclePolicy, SessionOptions, SettlePolicy};

/// Stand-in encoder: answers `-version`, fails for `.avi` inputs and
/// otherwise writes a small file to the output path (its last argument).
const FAKE_ENCODER: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
    echo "ffmpeg version 7.1-fake"
    exit 0
fi
prev=""
input=""
for arg; do
    if [ "$prev" = "-i" ]; then input="$arg"; fi
    prev="$arg"
    last="$arg"
done
case "$input" in
    *.avi)
        printf partial > "$last"
        echo "Invalid data found when processing input" >&2
        exit 1
        ;;
esac
printf converted > "$last"
"#;

pub fn fake_encoder(dir: &Path) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    fs::write(&path, FAKE_ENCODER).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"raw media").unwrap();
}

/// Options pointing at `source` with the fake encoder and permanent
/// deletion, so tests never depend on a desktop trash.
pub fn options(tmp: &Path, source: &Path) -> SessionOptions {
    let mut options = SessionOptions::new(source);
    options.encoder = fake_encoder(tmp);
    options.recycle = RecyclePolicy::Delete;
    options.auto_continue = true;
    options.workers = Some(2);
    options.settle = SettlePolicy {
        settle_delay: Duration::from_millis(50),
        poll_interval: Duration::from_millis(20),
        stable_checks: 1,
        max_settle_polls: 20,
    };
    options
}

/// Poll until `path` exists or `timeout` elapses.
pub async fn wait_for(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    path.exists()
}
