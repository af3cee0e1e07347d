//! Reconciles an on-disk `RUNNING` run with real OS state at resume
//! time. Never touches events already written and never deletes
//! artifacts — only a status flip plus one appended warning.

use delta_core::event::{JournalEvent, SystemLevel};
use delta_core::liveness::{self, Liveness};
use delta_core::metadata::RunStatus;
use delta_journal::Journal;

use crate::error::EngineError;

/// What the Janitor decided about a run it inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JanitorOutcome {
    /// The run is not `RUNNING`, or its owning process is still alive.
    /// Nothing was changed.
    Alive,
    /// The run's hostname doesn't match this host and no override was
    /// given; the caller must not proceed.
    RefusedCrossHost {
        recorded_hostname: String,
        local_hostname: String,
    },
    /// The owning process is gone or the PID was reused; the run was
    /// transitioned to `INTERRUPTED`.
    Orphaned { reason: String },
}

/// Inspect `journal`'s metadata and reconcile it if the run claims
/// `RUNNING` but its owning process is no longer the one that started
/// it. `force` accepts the cross-host risk explicitly.
pub async fn reconcile(journal: &Journal, force: bool) -> Result<JanitorOutcome, EngineError> {
    let metadata = journal.read_metadata()?;
    if metadata.status != RunStatus::Running {
        return Ok(JanitorOutcome::Alive);
    }

    let local_hostname = liveness::local_hostname();
    if metadata.hostname != local_hostname && !force {
        return Ok(JanitorOutcome::RefusedCrossHost {
            recorded_hostname: metadata.hostname,
            local_hostname,
        });
    }

    let reason = match liveness::probe(metadata.pid, &metadata.process_name) {
        Liveness::Alive => return Ok(JanitorOutcome::Alive),
        Liveness::Gone => format!("process {} is no longer running", metadata.pid),
        Liveness::Reused => format!(
            "pid {} now belongs to a different process than the one that started this run",
            metadata.pid
        ),
    };

    journal.update_metadata(|m| m.status = RunStatus::Interrupted)?;
    journal
        .append(JournalEvent::SystemMessage {
            level: SystemLevel::Warn,
            content: reason.clone(),
        })
        .await?;

    Ok(JanitorOutcome::Orphaned { reason })
}
