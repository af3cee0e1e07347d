//! Shared "spawn a subprocess, capture I/O, bound by a timeout"
//! primitive, reused by tool execution and hook execution so both get
//! identical timeout/kill/capture semantics.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Outcome of running a bounded subprocess. `exit_code` is `None` if
/// the process was killed for exceeding its timeout; stdout/stderr are
/// still whatever was captured before the kill.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    pub timed_out: bool,
}

/// Run `argv` with `cwd`, `env`, and optional `stdin`, bounded by
/// `timeout`. On timeout the child is killed and the outcome reports
/// `timed_out: true` with whatever output was captured so far —
/// truncated, but still persisted rather than discarded.
pub async fn run_bounded(
    argv: &[String],
    cwd: &Path,
    env: &HashMap<String, String>,
    stdin: Option<&str>,
    timeout: Duration,
) -> std::io::Result<SpawnOutcome> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(SpawnOutcome {
            stdout: String::new(),
            stderr: "empty command".to_string(),
            exit_code: Some(127),
            duration_ms: 0,
            timed_out: false,
        });
    };

    let mut cmd = Command::new(program);
    cmd.kill_on_drop(true)
        .args(args)
        .current_dir(cwd)
        .envs(env)
        .stdin(if stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        })
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
            // Drop to close the pipe so the child sees EOF.
            drop(pipe);
        }
    }

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(SpawnOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            duration_ms: start.elapsed().as_millis(),
            timed_out: false,
        }),
        Ok(Err(err)) => Err(err),
        Err(_) => Ok(SpawnOutcome {
            stdout: String::new(),
            stderr: format!("process exceeded timeout of {:?}", timeout),
            exit_code: None,
            duration_ms: start.elapsed().as_millis(),
            timed_out: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_success_exit_code() {
        let outcome = run_bounded(
            &["echo".to_string(), "hi".to_string()],
            &std::env::temp_dir(),
            &HashMap::new(),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.stdout.trim(), "hi");
        assert_eq!(outcome.exit_code, Some(0));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let outcome = run_bounded(
            &["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            &std::env::temp_dir(),
            &HashMap::new(),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn stdin_is_piped_to_child() {
        let outcome = run_bounded(
            &["cat".to_string()],
            &std::env::temp_dir(),
            &HashMap::new(),
            Some("piped input\n"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.stdout, "piped input\n");
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_timed_out() {
        let outcome = run_bounded(
            &["sleep".to_string(), "5".to_string()],
            &std::env::temp_dir(),
            &HashMap::new(),
            None,
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
        assert!(outcome.exit_code.is_none());
    }

    #[tokio::test]
    async fn timeout_actually_terminates_the_child_process() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let marker_path = marker.path().to_path_buf();
        std::fs::remove_file(&marker_path).unwrap();

        run_bounded(
            &[
                "sh".to_string(),
                "-c".to_string(),
                format!("sleep 5; touch {}", marker_path.display()),
            ],
            &std::env::temp_dir(),
            &HashMap::new(),
            None,
            Duration::from_millis(100),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(
            !marker_path.exists(),
            "child process kept running past the timeout and created its marker file"
        );
    }
}
