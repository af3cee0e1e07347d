//! The append-only journal and its companion metadata file. Every
//! write that reaches the journal file is serialized behind one mutex
//! per run.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use delta_core::event::{JournalEvent, JournalRecord};
use delta_core::metadata::RunMetadata;
use tokio::sync::Mutex;

use crate::artifacts::ArtifactStore;
use crate::error::JournalError;
use crate::workspace::Workspace;

const JOURNAL_FILE: &str = "journal.jsonl";
const METADATA_FILE: &str = "metadata.json";
const ENGINE_LOG_FILE: &str = "engine.log";

/// A run's journal, metadata file, engine log, and artifact tree.
pub struct Journal {
    run_dir: PathBuf,
    file: Mutex<std::fs::File>,
    next_seq: AtomicU64,
    artifacts: ArtifactStore,
}

impl Journal {
    /// Create a brand-new run directory and journal. Fails with
    /// [`JournalError::DuplicateRunId`] if the directory already exists
    /// — the existing directory is left untouched.
    pub fn create_new(workspace: &Workspace, run_id: &str) -> Result<Self, JournalError> {
        let run_dir = workspace.run_dir(run_id);
        if run_dir.exists() {
            return Err(JournalError::DuplicateRunId(
                run_id.to_string(),
                run_dir.display().to_string(),
            ));
        }
        std::fs::create_dir_all(&run_dir)?;
        Self::open_internal(run_dir, true)
    }

    /// Resume an existing run directory, scanning the journal to
    /// discover the highest `seq` already written.
    pub fn resume(workspace: &Workspace, run_id: &str) -> Result<Self, JournalError> {
        let run_dir = workspace.run_dir(run_id);
        if !run_dir.is_dir() {
            return Err(JournalError::RunNotFound(run_id.to_string()));
        }
        Self::open_internal(run_dir, false)
    }

    fn open_internal(run_dir: PathBuf, fresh: bool) -> Result<Self, JournalError> {
        std::fs::create_dir_all(run_dir.join("interaction"))?;
        let artifacts = ArtifactStore::open(&run_dir)?;

        let journal_path = run_dir.join(JOURNAL_FILE);
        let max_seq = if fresh || !journal_path.exists() {
            0
        } else {
            Self::scan_max_seq(&journal_path)?
        };

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        Ok(Self {
            run_dir,
            file: Mutex::new(file),
            next_seq: AtomicU64::new(max_seq + 1),
            artifacts,
        })
    }

    fn scan_max_seq(path: &PathBuf) -> Result<u64, JournalError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut max_seq = 0u64;
        let mut offset = 0u64;
        for line in reader.lines() {
            let line = line?;
            let len = line.len() as u64 + 1;
            if line.trim().is_empty() {
                offset += len;
                continue;
            }
            let record: JournalRecord = serde_json::from_str(&line)
                .map_err(|source| JournalError::MalformedLine { offset, source })?;
            max_seq = max_seq.max(record.seq);
            offset += len;
        }
        Ok(max_seq)
    }

    pub fn run_dir(&self) -> &PathBuf {
        &self.run_dir
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Append one event, assigning it the next sequence number.
    /// A write failure surfaces with a "Failed to write journal
    /// event" prefix so callers can match on it as a testable contract.
    pub async fn append(&self, event: JournalEvent) -> Result<u64, JournalError> {
        let mut guard = self.file.lock().await;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = JournalRecord {
            seq,
            timestamp: Utc::now(),
            event,
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| JournalError::AppendFailed(e.to_string()))?;
        line.push('\n');
        guard
            .write_all(line.as_bytes())
            .map_err(|e| JournalError::AppendFailed(e.to_string()))?;
        guard
            .flush()
            .map_err(|e| JournalError::AppendFailed(e.to_string()))?;
        Ok(seq)
    }

    /// Parse every non-blank line. A malformed line is a fatal read
    /// error — it is never silently skipped.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, JournalError> {
        let path = self.run_dir.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&path)?;
        let reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        let mut offset = 0u64;
        for line in reader.lines() {
            let line = line?;
            let len = line.len() as u64 + 1;
            if line.trim().is_empty() {
                offset += len;
                continue;
            }
            let record: JournalRecord = serde_json::from_str(&line)
                .map_err(|source| JournalError::MalformedLine { offset, source })?;
            records.push(record);
            offset += len;
        }
        Ok(records)
    }

    /// Filter helper over [`read_all`].
    pub fn read_by_type(
        &self,
        predicate: impl Fn(&JournalEvent) -> bool,
    ) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| predicate(&r.event))
            .collect())
    }

    fn metadata_path(&self) -> PathBuf {
        self.run_dir.join(METADATA_FILE)
    }

    fn write_metadata_atomic(&self, metadata: &RunMetadata) -> Result<(), JournalError> {
        let path = self.metadata_path();
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(metadata)?)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn initialize_metadata(&self, metadata: &RunMetadata) -> Result<(), JournalError> {
        self.write_metadata_atomic(metadata)
    }

    pub fn read_metadata(&self) -> Result<RunMetadata, JournalError> {
        let raw = std::fs::read_to_string(self.metadata_path())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Read-modify-write metadata atomically (write-to-temp + rename),
    /// so a crash never produces a partial metadata file.
    pub fn update_metadata(
        &self,
        patch: impl FnOnce(&mut RunMetadata),
    ) -> Result<RunMetadata, JournalError> {
        let mut metadata = self.read_metadata()?;
        patch(&mut metadata);
        self.write_metadata_atomic(&metadata)?;
        Ok(metadata)
    }

    /// Append a human-readable diagnostic line. Best-effort: failures
    /// are logged via `tracing` and never propagated.
    pub fn write_engine_log(&self, line: &str) {
        let path = self.run_dir.join(ENGINE_LOG_FILE);
        let formatted = format!("[{}] {}\n", Utc::now().to_rfc3339(), line);
        if let Err(err) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(formatted.as_bytes()))
        {
            tracing::warn!(error = %err, "failed to write engine.log line (best-effort)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::event::ActionStatus;
    use delta_core::metadata::RunStatus;

    fn open_workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    #[tokio::test]
    async fn create_new_assigns_sequential_seq_starting_at_one() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        let seq1 = journal
            .append(JournalEvent::RunStart {
                run_id: "r1".into(),
                task: "t".into(),
                agent_ref: "a".into(),
            })
            .await
            .unwrap();
        let seq2 = journal
            .append(JournalEvent::UserMessage { content: "hi".into() })
            .await
            .unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
    }

    #[tokio::test]
    async fn create_new_fails_on_duplicate_run_id_without_touching_existing_dir() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        journal
            .append(JournalEvent::RunStart {
                run_id: "r1".into(),
                task: "t".into(),
                agent_ref: "a".into(),
            })
            .await
            .unwrap();
        let before = std::fs::read_to_string(journal.run_dir().join("journal.jsonl")).unwrap();

        let err = Journal::create_new(&ws, "r1").unwrap_err();
        assert!(matches!(err, JournalError::DuplicateRunId(_, _)));

        let after = std::fs::read_to_string(journal.run_dir().join("journal.jsonl")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn resume_continues_sequence_after_restart() {
        let (_dir, ws) = open_workspace();
        {
            let journal = Journal::create_new(&ws, "r1").unwrap();
            journal
                .append(JournalEvent::RunStart {
                    run_id: "r1".into(),
                    task: "t".into(),
                    agent_ref: "a".into(),
                })
                .await
                .unwrap();
            journal
                .append(JournalEvent::UserMessage { content: "hi".into() })
                .await
                .unwrap();
        }
        let resumed = Journal::resume(&ws, "r1").unwrap();
        let seq3 = resumed
            .append(JournalEvent::SystemMessage {
                level: delta_core::event::SystemLevel::Info,
                content: "resumed".into(),
            })
            .await
            .unwrap();
        assert_eq!(seq3, 3);
    }

    #[tokio::test]
    async fn read_all_rejects_malformed_lines() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        journal
            .append(JournalEvent::RunStart {
                run_id: "r1".into(),
                task: "t".into(),
                agent_ref: "a".into(),
            })
            .await
            .unwrap();
        let path = journal.run_dir().join("journal.jsonl");
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"not json at all\n").unwrap();

        let err = journal.read_all().unwrap_err();
        assert!(matches!(err, JournalError::MalformedLine { .. }));
    }

    #[tokio::test]
    async fn read_by_type_filters_correctly() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        journal
            .append(JournalEvent::RunStart {
                run_id: "r1".into(),
                task: "t".into(),
                agent_ref: "a".into(),
            })
            .await
            .unwrap();
        journal
            .append(JournalEvent::ActionResult {
                action_id: "a1".into(),
                status: ActionStatus::Success,
                observation_content: "ok".into(),
                execution_ref: Some("a1".into()),
            })
            .await
            .unwrap();

        let results = journal
            .read_by_type(|e| matches!(e, JournalEvent::ActionResult { .. }))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn metadata_updates_are_atomic_and_readable() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        let meta = RunMetadata::new_running("r1".into(), "agents/demo".into(), "task".into());
        journal.initialize_metadata(&meta).unwrap();

        let updated = journal
            .update_metadata(|m| {
                m.status = RunStatus::Completed;
                m.iterations_completed = 3;
            })
            .unwrap();
        assert_eq!(updated.status, RunStatus::Completed);

        let reread = journal.read_metadata().unwrap();
        assert_eq!(reread.status, RunStatus::Completed);
        assert_eq!(reread.iterations_completed, 3);
    }

    #[tokio::test]
    async fn engine_log_appends_lines() {
        let (_dir, ws) = open_workspace();
        let journal = Journal::create_new(&ws, "r1").unwrap();
        journal.write_engine_log("starting up");
        journal.write_engine_log("iteration 1");
        let contents = std::fs::read_to_string(journal.run_dir().join("engine.log")).unwrap();
        assert!(contents.contains("starting up"));
        assert!(contents.contains("iteration 1"));
    }
}
