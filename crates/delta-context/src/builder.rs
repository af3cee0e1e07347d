//! `materialize(source, ctx) -> messages`, one implementation per
//! [`Source`] variant, composed by [`build`] into the ordered message
//! list sent to the LLM.

use std::time::Duration;

use delta_core::config::{ContextManifest, OnMissing, Source};
use delta_core::event::JournalEvent;
use delta_core::message::Message;
use delta_journal::Journal;
use tokio::process::Command;

use crate::error::ContextError;
use crate::vars::{substitute, TemplateVars};

/// Replay the journal into role-tagged messages. `max_iterations`, if
/// set, keeps only the last N iterations — an iteration is delimited by
/// a `THOUGHT` event and the batch of `ACTION_*` events it causes.
fn replay_journal(
    journal: &Journal,
    max_iterations: Option<u64>,
) -> Result<Vec<Message>, ContextError> {
    let records = journal.read_all()?;

    // Assign each record to an iteration group. Events before the
    // first THOUGHT share group 0 with that first THOUGHT; each
    // subsequent THOUGHT starts a new group.
    let mut groups = Vec::with_capacity(records.len());
    let mut group = 0u64;
    let mut seen_first_thought = false;
    for record in &records {
        if matches!(record.event, JournalEvent::Thought { .. }) {
            if seen_first_thought {
                group += 1;
            }
            seen_first_thought = true;
        }
        groups.push(group);
    }
    let total_groups = group + 1;
    let min_group = match max_iterations {
        Some(n) if n < total_groups => total_groups - n,
        _ => 0,
    };

    let mut messages = Vec::new();
    for (record, grp) in records.iter().zip(groups.iter()) {
        if *grp < min_group {
            continue;
        }
        match &record.event {
            JournalEvent::UserMessage { content } => {
                messages.push(Message::user(content.clone()));
            }
            JournalEvent::Thought {
                content,
                tool_calls,
                ..
            } => {
                messages.push(Message::assistant(content.clone(), tool_calls.clone()));
            }
            JournalEvent::ActionResult {
                action_id,
                observation_content,
                ..
            } => {
                messages.push(Message::tool(action_id.clone(), observation_content.clone()));
            }
            _ => {}
        }
    }
    Ok(messages)
}

async fn materialize_file(
    id: &str,
    path: &str,
    on_missing: OnMissing,
    vars: &TemplateVars,
) -> Result<Vec<Message>, ContextError> {
    let resolved_path = substitute(path, vars);
    match tokio::fs::read_to_string(&resolved_path).await {
        Ok(content) => Ok(vec![Message::system(content)]),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => match on_missing {
            OnMissing::Error => Err(ContextError::MissingFile {
                id: id.to_string(),
                path: resolved_path,
            }),
            OnMissing::Skip => Ok(Vec::new()),
        },
        Err(err) => Err(ContextError::OutputUnreadable {
            id: id.to_string(),
            path: resolved_path,
            source: err,
        }),
    }
}

async fn materialize_computed_file(
    id: &str,
    generator_command: &[String],
    output_path: &str,
    timeout_ms: u64,
    workspace_root: &std::path::Path,
    vars: &TemplateVars,
) -> Result<Vec<Message>, ContextError> {
    let resolved_command: Vec<String> = generator_command
        .iter()
        .map(|token| substitute(token, vars))
        .collect();
    let resolved_output_path = substitute(output_path, vars);

    let Some((program, args)) = resolved_command.split_first() else {
        return Err(ContextError::GeneratorFailed {
            id: id.to_string(),
            exit_code: None,
            stderr: "empty generator_command".to_string(),
        });
    };

    let mut cmd = Command::new(program);
    cmd.kill_on_drop(true).args(args).current_dir(workspace_root);

    let output = tokio::time::timeout(Duration::from_millis(timeout_ms), cmd.output())
        .await
        .map_err(|_| ContextError::GeneratorTimeout {
            id: id.to_string(),
            timeout_ms,
        })??;

    if !output.status.success() {
        return Err(ContextError::GeneratorFailed {
            id: id.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let content = tokio::fs::read_to_string(&resolved_output_path)
        .await
        .map_err(|source| ContextError::OutputUnreadable {
            id: id.to_string(),
            path: resolved_output_path,
            source,
        })?;
    Ok(vec![Message::system(content)])
}

/// Build the ordered message list for `manifest` against `journal`,
/// with `workspace_root` as the directory computed-file generators run
/// in. Pure function of the manifest and journal contents (property 7):
/// building context twice on the same journal returns byte-identical
/// message arrays.
pub async fn build(
    manifest: &ContextManifest,
    journal: &Journal,
    workspace_root: &std::path::Path,
    vars: &TemplateVars,
) -> Result<Vec<Message>, ContextError> {
    let mut messages = Vec::new();
    for source in manifest {
        match source {
            Source::File {
                path,
                id,
                on_missing,
            } => {
                let id = id.as_deref().unwrap_or(path);
                messages.extend(materialize_file(id, path, *on_missing, vars).await?);
            }
            Source::ComputedFile {
                generator_command,
                output_path,
                timeout_ms,
                id,
            } => {
                let id = id.as_deref().unwrap_or(output_path);
                messages.extend(
                    materialize_computed_file(
                        id,
                        generator_command,
                        output_path,
                        *timeout_ms,
                        workspace_root,
                        vars,
                    )
                    .await?,
                );
            }
            Source::Journal { max_iterations, .. } => {
                messages.extend(replay_journal(journal, *max_iterations)?);
            }
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::event::{ActionStatus, SystemLevel, ToolCall};
    use delta_journal::Workspace;
    use serde_json::json;

    fn test_vars() -> TemplateVars {
        TemplateVars {
            agent_home: "/agents/demo".into(),
            cwd: "/workspace".into(),
            run_id: "r1".into(),
        }
    }

    async fn seeded_journal(dir: &std::path::Path) -> Journal {
        let ws = Workspace::open(dir).unwrap();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        journal
            .append(JournalEvent::RunStart {
                run_id: "r1".into(),
                task: "print hello".into(),
                agent_ref: "agents/demo".into(),
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::UserMessage {
                content: "print hello".into(),
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::Thought {
                content: "I'll echo it".into(),
                llm_invocation_ref: "inv1".into(),
                tool_calls: Some(vec![ToolCall {
                    action_id: "a1".into(),
                    tool_name: "echo".into(),
                    tool_args: json!({"msg": "hello"}),
                }]),
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::ActionRequest {
                action_id: "a1".into(),
                tool_name: "echo".into(),
                tool_args: json!({"msg": "hello"}),
                resolved_command: vec!["echo".into(), "hello".into()],
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::ActionResult {
                action_id: "a1".into(),
                status: ActionStatus::Success,
                observation_content: "hello\n".into(),
                execution_ref: Some("a1".into()),
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::SystemMessage {
                level: SystemLevel::Info,
                content: "noise, ignored for context".into(),
            })
            .await
            .unwrap();
        journal
    }

    #[tokio::test]
    async fn journal_source_replays_user_thought_and_tool_messages() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let manifest = vec![Source::Journal {
            max_iterations: None,
            id: None,
        }];
        let messages = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, delta_core::message::Role::User);
        assert_eq!(messages[1].role, delta_core::message::Role::Assistant);
        assert_eq!(messages[2].role, delta_core::message::Role::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn building_context_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let manifest = vec![Source::Journal {
            max_iterations: None,
            id: None,
        }];
        let first = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        let second = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn file_source_missing_with_error_policy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let manifest = vec![Source::File {
            path: "${CWD}/does-not-exist.md".into(),
            id: Some("missing".into()),
            on_missing: OnMissing::Error,
        }];
        let err = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::MissingFile { .. }));
    }

    #[tokio::test]
    async fn file_source_missing_with_skip_policy_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let manifest = vec![Source::File {
            path: "${CWD}/does-not-exist.md".into(),
            id: Some("missing".into()),
            on_missing: OnMissing::Skip,
        }];
        let messages = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn file_source_substitutes_cwd_and_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        std::fs::write(dir.path().join("prompt.md"), "be helpful").unwrap();
        let manifest = vec![Source::File {
            path: "${CWD}/prompt.md".into(),
            id: None,
            on_missing: OnMissing::Error,
        }];
        let messages = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "be helpful");
        assert_eq!(messages[0].role, delta_core::message::Role::System);
    }

    #[tokio::test]
    async fn computed_file_source_runs_generator_and_reads_output() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let output_path = dir.path().join("summary.txt");
        let manifest = vec![Source::ComputedFile {
            generator_command: vec![
                "sh".into(),
                "-c".into(),
                format!("echo summarized > {}", output_path.display()),
            ],
            output_path: output_path.display().to_string(),
            timeout_ms: 5000,
            id: None,
        }];
        let messages = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.trim(), "summarized");
    }

    #[tokio::test]
    async fn computed_file_source_nonzero_exit_is_a_clear_error() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let manifest = vec![Source::ComputedFile {
            generator_command: vec!["sh".into(), "-c".into(), "exit 2".into()],
            output_path: "unused.txt".into(),
            timeout_ms: 5000,
            id: Some("summarizer".into()),
        }];
        let err = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::GeneratorFailed { .. }));
    }

    #[tokio::test]
    async fn computed_file_source_timeout_kills_the_generator() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        let marker_path = dir.path().join("marker.txt");
        let manifest = vec![Source::ComputedFile {
            generator_command: vec![
                "sh".into(),
                "-c".into(),
                format!("sleep 5; touch {}", marker_path.display()),
            ],
            output_path: "unused.txt".into(),
            timeout_ms: 100,
            id: Some("slow_summarizer".into()),
        }];
        let err = build(&manifest, &journal, dir.path(), &test_vars())
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::GeneratorTimeout { .. }));

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(
            !marker_path.exists(),
            "generator kept running past the timeout and created its marker file"
        );
    }

    #[tokio::test]
    async fn max_iterations_keeps_only_the_last_n_groups() {
        let dir = tempfile::tempdir().unwrap();
        let journal = seeded_journal(dir.path()).await;
        // Add a second iteration: another THOUGHT + ACTION_RESULT pair.
        journal
            .append(JournalEvent::Thought {
                content: "done".into(),
                llm_invocation_ref: "inv2".into(),
                tool_calls: None,
            })
            .await
            .unwrap();

        let manifest_all = vec![Source::Journal {
            max_iterations: None,
            id: None,
        }];
        let all = build(&manifest_all, &journal, dir.path(), &test_vars())
            .await
            .unwrap();

        let manifest_last_one = vec![Source::Journal {
            max_iterations: Some(1),
            id: None,
        }];
        let last_one = build(&manifest_last_one, &journal, dir.path(), &test_vars())
            .await
            .unwrap();

        assert!(last_one.len() < all.len());
        // Only the final assistant message ("done") should survive.
        assert_eq!(last_one.len(), 1);
        assert_eq!(last_one[0].content, "done");
    }
}
