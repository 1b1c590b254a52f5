#![deny(missing_docs)]
//! # axon-tools — built-in code-unit specifications
//!
//! A small function library agents can declare as tools: [`view_file`] for
//! reading source files and [`bash`] for shell commands. Each returns the
//! process-wide singleton `Arc<FuncSpec>`, so every agent declaring a tool
//! shares one registered identity.

use axon_runtime::FuncSpec;
use axon_types::{ArgSpec, ArgType, AxonError};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Files longer than this many characters are truncated head+tail.
const VIEW_FILE_MAX_CHARS: usize = 50_000;
const VIEW_FILE_HEAD_CHARS: usize = 45_000;
const VIEW_FILE_TAIL_CHARS: usize = 4_000;

/// Default timeout for [`bash`] commands.
const BASH_DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Read a file by absolute path and return its text contents.
///
/// Decodes as UTF-8 with replacement; very large files are truncated to a
/// head and tail around a truncation marker to keep the model payload
/// reasonable.
pub fn view_file() -> Arc<FuncSpec> {
    static SPEC: OnceLock<Arc<FuncSpec>> = OnceLock::new();
    SPEC.get_or_init(|| {
        FuncSpec::code(
            "view_file",
            "Read a source file by absolute path and return its text contents.",
        )
        .arg(ArgSpec::new("path", ArgType::Text, "Absolute file path to read."))
        .build(|_ctx, args| async move {
            let path = args.text("path")?.to_string();
            read_file_text(&path).await
        })
        .expect("view_file specification is statically valid")
    })
    .clone()
}

async fn read_file_text(path: &str) -> Result<Value, AxonError> {
    if !Path::new(path).is_absolute() {
        return Err(AxonError::message(format!(
            "view_file: expected absolute path, got {path:?}"
        )));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AxonError::message(format!("view_file: cannot read {path}: {e}")))?;
    let data = String::from_utf8_lossy(&bytes).into_owned();
    Ok(json!(truncate_middle(data)))
}

/// Keep the head and tail of oversized content around a marker.
fn truncate_middle(data: String) -> String {
    if data.chars().count() <= VIEW_FILE_MAX_CHARS {
        return data;
    }
    let head: String = data.chars().take(VIEW_FILE_HEAD_CHARS).collect();
    let tail_start = data.chars().count() - VIEW_FILE_TAIL_CHARS;
    let tail: String = data.chars().skip(tail_start).collect();
    format!("{head}\n\n[...TRUNCATED...]\n\n{tail}")
}

/// Execute a shell command and return its combined output.
///
/// Runs `bash -c` with an optional working directory and timeout. A
/// non-zero exit status is reported as a tool error carrying the captured
/// output, so the model sees what went wrong.
pub fn bash() -> Arc<FuncSpec> {
    static SPEC: OnceLock<Arc<FuncSpec>> = OnceLock::new();
    SPEC.get_or_init(|| {
        FuncSpec::code(
            "bash",
            "Execute a shell command and return stdout/stderr. \
             Quote paths containing spaces.",
        )
        .arg(ArgSpec::new(
            "command",
            ArgType::Text,
            "The exact command line to run (as a single string).",
        ))
        .arg(
            ArgSpec::new("cwd", ArgType::Text, "Optional working directory for the command.")
                .optional(),
        )
        .arg(
            ArgSpec::new("timeout_sec", ArgType::Real, "Optional timeout in seconds.")
                .optional(),
        )
        .build(|_ctx, args| async move {
            let command = args.text("command")?.to_string();
            let cwd = args.opt_text("cwd").map(str::to_string);
            let timeout = match args.opt_real("timeout_sec") {
                Some(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
                Some(secs) => {
                    return Err(AxonError::message(format!(
                        "bash: timeout_sec must be positive, got {secs}"
                    )));
                }
                None => BASH_DEFAULT_TIMEOUT,
            };
            run_bash(&command, cwd.as_deref(), timeout).await
        })
        .expect("bash specification is statically valid")
    })
    .clone()
}

async fn run_bash(command: &str, cwd: Option<&str>, timeout: Duration) -> Result<Value, AxonError> {
    tracing::debug!(%command, "bash");

    let mut cmd = tokio::process::Command::new("bash");
    cmd.arg("-c").arg(command).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            AxonError::message(format!(
                "bash: command timed out after {:.1}s",
                timeout.as_secs_f64()
            ))
        })?
        .map_err(|e| AxonError::message(format!("bash: failed to execute: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut combined = String::new();
    if !stdout.is_empty() {
        combined.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str("[stderr]\n");
        combined.push_str(&stderr);
    }

    if output.status.success() {
        Ok(json!(combined))
    } else {
        Err(AxonError::message(format!(
            "bash: command exited with {}\n{combined}",
            output.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn specs_are_singletons() {
        assert!(Arc::ptr_eq(&view_file(), &view_file()));
        assert!(Arc::ptr_eq(&bash(), &bash()));
    }

    #[test]
    fn truncation_keeps_head_and_tail() {
        let data: String = "x".repeat(60_000);
        let out = truncate_middle(data);
        assert!(out.contains("[...TRUNCATED...]"));
        assert!(out.len() < 60_000);

        let small = truncate_middle("short".into());
        assert_eq!(small, "short");
    }

    #[tokio::test]
    async fn view_file_rejects_relative_paths() {
        let err = read_file_text("relative/path.txt").await.unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[tokio::test]
    async fn view_file_reads_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello from the file").unwrap();
        let path = file.path().to_str().unwrap();

        let out = read_file_text(path).await.unwrap();
        assert!(out.as_str().unwrap().contains("hello from the file"));
    }

    #[tokio::test]
    async fn view_file_missing_file_errors() {
        let err = read_file_text("/definitely/not/here.txt").await.unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[tokio::test]
    async fn bash_captures_stdout() {
        let out = run_bash("echo hello", None, BASH_DEFAULT_TIMEOUT).await.unwrap();
        assert_eq!(out.as_str().unwrap().trim(), "hello");
    }

    #[tokio::test]
    async fn bash_nonzero_exit_is_an_error() {
        let err = run_bash("echo oops >&2; exit 3", None, BASH_DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("exited"));
        assert!(text.contains("oops"));
    }

    #[tokio::test]
    async fn bash_times_out() {
        let err = run_bash("sleep 5", None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn bash_respects_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_bash("pwd", Some(dir.path().to_str().unwrap()), BASH_DEFAULT_TIMEOUT)
            .await
            .unwrap();
        let printed = out.as_str().unwrap().trim();
        // Canonicalize both sides; macOS tempdirs live behind /private.
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        let actual = std::fs::canonicalize(printed).unwrap();
        assert_eq!(actual, expected);
    }
}
