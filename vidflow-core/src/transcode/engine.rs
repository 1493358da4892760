use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::types::{ConversionTask, EncoderPreset};

/// How long `-version` may take before the encoder counts as unresponsive.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of encoder stderr carried into error messages.
const STDERR_EXCERPT_LINES: usize = 10;

/// Failure taxonomy for a single encode.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to prepare output directory {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn encoder: {0}")]
    Spawn(#[source] io::Error),

    #[error("encoder exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("encoder reported success but output is missing or empty: {stderr}")]
    EmptyOutput { stderr: String },
}

/// Runs the external encoder for one task at a time.
///
/// The engine holds no per-task state, so a single instance is shared by
/// every worker.
#[derive(Debug, Clone)]
pub struct TranscodeEngine {
    program: PathBuf,
}

impl TranscodeEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the encoder can be executed. Returns the first line of the
    /// version banner.
    pub async fn probe(&self) -> Result<String> {
        info!(encoder = %self.program.display(), "checking encoder");
        let unavailable = |reason: String| PipelineError::EncoderUnavailable {
            path: self.program.clone(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output();
        let output = match timeout(PROBE_TIMEOUT, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(unavailable(err.to_string())),
            Err(_) => {
                return Err(unavailable(format!(
                    "'-version' timed out after {}s",
                    PROBE_TIMEOUT.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "'-version' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let banner = stdout.lines().next().unwrap_or_default().to_string();
        info!(version = %banner, "encoder available");
        Ok(banner)
    }

    /// Convert one task. Failures are logged with the encoder's diagnostic
    /// output and reported as `false`; the output path is never left
    /// half-written.
    pub async fn convert(&self, task: &ConversionTask) -> bool {
        match self.try_convert(task).await {
            Ok(output) => {
                info!(
                    original = %task.original.display(),
                    output = %output.display(),
                    "conversion succeeded"
                );
                true
            }
            Err(err) => {
                error!(
                    original = %task.original.display(),
                    "conversion failed: {}",
                    err
                );
                false
            }
        }
    }

    /// Convert one task, returning the output path on success.
    pub async fn try_convert(
        &self,
        task: &ConversionTask,
    ) -> std::result::Result<PathBuf, TranscodeError> {
        let output = task.output_path();
        let result = self.encode(&task.original, &output, task.preset).await;
        if result.is_err() {
            remove_partial_output(&output).await;
        }
        result.map(|()| output)
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        preset: EncoderPreset,
    ) -> std::result::Result<(), TranscodeError> {
        if let Some(parent) = output.parent() {
            // create_dir_all tolerates a sibling worker creating the same
            // directory concurrently.
            tokio::fs::create_dir_all(parent).await.map_err(|source| {
                TranscodeError::Prepare {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let mut cmd =
            build_encoder_command(&self.program, input, output, preset);
        debug!("starting encoder: {:?}", cmd);
        let finished = cmd.output().await.map_err(TranscodeError::Spawn)?;
        let stderr = stderr_excerpt(&finished.stderr);

        if !finished.status.success() {
            return Err(TranscodeError::Exit {
                code: finished.status.code(),
                stderr,
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
            _ => Err(TranscodeError::EmptyOutput { stderr }),
        }
    }
}

/// Build the encoder invocation: quiet banner and logging, overwrite, h264
/// video at the requested preset, aac audio.
pub fn build_encoder_command(
    program: &Path,
    input: &Path,
    output: &Path,
    preset: EncoderPreset,
) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg(preset.as_str())
        .arg("-c:a")
        .arg("aac")
        .arg(output);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    // A terminal Ctrl-C signals the whole foreground group; the encoder gets
    // its own group so only this process decides whether to stop.
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

fn stderr_excerpt(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(STDERR_EXCERPT_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {
            debug!(output = %output.display(), "removed partial output")
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            output = %output.display(),
            "failed to remove partial output: {}",
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn command_follows_argument_contract() {
        let cmd = build_encoder_command(
            Path::new("/usr/bin/ffmpeg"),
            Path::new("/in/a.mov"),
            Path::new("/out/a.mp4"),
            EncoderPreset::Veryfast,
        );
        let args: Vec<&OsStr> = cmd.as_std().get_args().collect();
        let expected: Vec<&OsStr> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-i",
            "/in/a.mov",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-c:a",
            "aac",
            "/out/a.mp4",
        ]
        .iter()
        .map(OsStr::new)
        .collect();
        assert_eq!(args, expected);
        assert_eq!(cmd.as_std().get_program(), OsStr::new("/usr/bin/ffmpeg"));
    }

    #[test]
    fn stderr_excerpt_drops_blank_lines_and_truncates() {
        let raw = (0..20)
            .map(|i| format!("line {i}\n\n"))
            .collect::<String>();
        let excerpt = stderr_excerpt(raw.as_bytes());
        assert_eq!(excerpt.lines().count(), STDERR_EXCERPT_LINES);
        assert!(excerpt.starts_with("line 0\nline 1"));
    }

    #[tokio::test]
    async fn probe_reports_missing_encoder() {
        let engine = TranscodeEngine::new("/definitely/not/an/encoder");
        let err = engine.probe().await.unwrap_err();
        assert!(matches!(err, PipelineError::EncoderUnavailable { .. }));
    }

    #[cfg(unix)]
    mod with_fake_encoder {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(
                &path,
                std::fs::Permissions::from_mode(0o755),
            )
            .unwrap();
            path
        }

        fn task(tmp: &TempDir) -> ConversionTask {
            let source_root = tmp.path().join("src");
            std::fs::create_dir_all(source_root.join("a")).unwrap();
            let original = source_root.join("a/clip.mov");
            std::fs::write(&original, b"raw").unwrap();
            ConversionTask {
                original,
                source_root,
                output_root: tmp.path().join("src_converted"),
                error_root: tmp.path().join("src_errors"),
                preset: EncoderPreset::Medium,
            }
        }

        #[tokio::test]
        async fn writes_output_on_success() {
            let tmp = TempDir::new().unwrap();
            // The output path is always the last argument.
            let encoder = fake_encoder(
                tmp.path(),
                r#"for last; do :; done; printf converted > "$last""#,
            );
            let task = task(&tmp);
            let engine = TranscodeEngine::new(encoder);

            let output = engine.try_convert(&task).await.unwrap();
            assert_eq!(output, tmp.path().join("src_converted/a/clip.mp4"));
            assert_eq!(std::fs::read(&output).unwrap(), b"converted");
        }

        #[tokio::test]
        async fn zero_exit_with_empty_output_is_a_failure() {
            let tmp = TempDir::new().unwrap();
            let encoder = fake_encoder(
                tmp.path(),
                r#"for last; do :; done; : > "$last"; exit 0"#,
            );
            let task = task(&tmp);
            let engine = TranscodeEngine::new(encoder);

            let err = engine.try_convert(&task).await.unwrap_err();
            assert!(matches!(err, TranscodeError::EmptyOutput { .. }));
            assert!(!task.output_path().exists());
        }

        #[tokio::test]
        async fn non_zero_exit_removes_partial_output() {
            let tmp = TempDir::new().unwrap();
            let encoder = fake_encoder(
                tmp.path(),
                r#"for last; do :; done; printf half > "$last"; echo "Invalid data found" >&2; exit 1"#,
            );
            let task = task(&tmp);
            let engine = TranscodeEngine::new(encoder);

            let err = engine.try_convert(&task).await.unwrap_err();
            match err {
                TranscodeError::Exit { code, stderr } => {
                    assert_eq!(code, Some(1));
                    assert!(stderr.contains("Invalid data found"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!task.output_path().exists());
            assert!(!engine.convert(&task).await);
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn encoder_runs_in_its_own_process_group() {
            let tmp = TempDir::new().unwrap();
            // Field 5 of /proc/<pid>/stat is the process group id.
            let encoder = fake_encoder(
                tmp.path(),
                r#"for last; do :; done
read -r _ _ _ _ pgid _ < /proc/$$/stat
printf '%s %s' "$$" "$pgid" > "$last""#,
            );
            let task = task(&tmp);
            let engine = TranscodeEngine::new(encoder);

            let output = engine.try_convert(&task).await.unwrap();
            let written = std::fs::read_to_string(output).unwrap();
            let (pid, pgid) = written.split_once(' ').unwrap();
            assert_eq!(pid, pgid, "encoder shares the caller's process group");
        }

        #[tokio::test]
        async fn probe_returns_version_banner() {
            let tmp = TempDir::new().unwrap();
            let encoder =
                fake_encoder(tmp.path(), "echo 'ffmpeg version 7.1-test'");
            let engine = TranscodeEngine::new(encoder);
            assert_eq!(engine.probe().await.unwrap(), "ffmpeg version 7.1-test");
        }
    }
}
