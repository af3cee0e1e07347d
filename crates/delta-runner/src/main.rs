//! Binary entry point: either re-execs into session-holder mode (when
//! invoked with the session sentinel argv) or reads a [`RunRequest`]
//! from disk, drives it, and prints a [`RunResult`].
//!
//! stdout carries only the structured result (or nothing, for
//! `--text`); every human-readable log line goes to stderr so stdout
//! stays machine-parseable for callers piping it elsewhere.

use std::path::PathBuf;
use std::process::ExitCode;

use delta_runner::{cancellation_token_with_signal_handler, RunRequest};

fn exit_code_for(status: delta_core::metadata::RunStatus) -> u8 {
    use delta_core::metadata::RunStatus::*;
    match status {
        Completed => 0,
        Failed => 1,
        WaitingForInput => 101,
        Interrupted => 130,
        Running => 1,
    }
}

async fn run_holder_mode(args: &[String]) -> ExitCode {
    let [session_id, sessions_dir, work_dir] = match args {
        [_sentinel, session_id, sessions_dir, work_dir] => {
            [session_id.clone(), sessions_dir.clone(), work_dir.clone()]
        }
        _ => {
            eprintln!("malformed session holder invocation");
            return ExitCode::from(126);
        }
    };
    let result = delta_session::holder::run(
        session_id,
        PathBuf::from(sessions_dir),
        PathBuf::from(work_dir),
    )
    .await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("session holder exited with an error: {err}");
            ExitCode::from(1)
        }
    }
}

fn load_request(path: &str) -> anyhow::Result<RunRequest> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some(delta_session::HOLDER_SENTINEL_ARG) {
        return run_holder_mode(&args).await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(request_path) = args.get(1) else {
        eprintln!("usage: delta-runner <run_request.json>");
        return ExitCode::from(126);
    };

    let request = match load_request(request_path) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("failed to read run request '{request_path}': {err}");
            return ExitCode::from(126);
        }
    };

    let cancel = cancellation_token_with_signal_handler();
    match delta_runner::run(request, cancel).await {
        Ok(result) => {
            let code = exit_code_for(result.status);
            match serde_json::to_string(&result) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("failed to serialize run result: {err}"),
            }
            ExitCode::from(code)
        }
        Err(err) => {
            eprintln!("run driver error: {err}");
            ExitCode::from(1)
        }
    }
}
