//! Workspace discovery/creation and the `.delta/` control plane.
//!
//! A workspace has no global "current run" pointer by design — that
//! pointer was deliberately eliminated to permit concurrent runs.
//! Multiple workspaces a user has worked in are
//! tracked separately by [`WorkspaceRegistry`], which is bookkeeping
//! for *workspace* selection, not run state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JournalError;

const SCHEMA_VERSION: &str = "1";
const CONTROL_DIR: &str = ".delta";
const VERSION_FILE: &str = "VERSION";

/// A single workspace: a directory containing user data plus a
/// `.delta/` control-plane subdirectory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open (lazily creating) a workspace rooted at `root`. Ensures
    /// `.delta/VERSION` exists; never deletes anything.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let control_dir = root.join(CONTROL_DIR);
        std::fs::create_dir_all(&control_dir)?;
        let version_path = control_dir.join(VERSION_FILE);
        if !version_path.exists() {
            std::fs::write(&version_path, SCHEMA_VERSION)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    /// The directory `.delta/<run_id>/` for a given run id, which may
    /// not exist yet.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.control_dir().join(run_id)
    }

    /// Whether a run directory already exists — used to enforce I4
    /// before any files are written for a new run.
    pub fn run_exists(&self, run_id: &str) -> bool {
        self.run_dir(run_id).is_dir()
    }

    pub fn schema_version(&self) -> Result<String, JournalError> {
        Ok(std::fs::read_to_string(
            self.control_dir().join(VERSION_FILE),
        )?)
    }

    /// List run ids currently present under `.delta/`.
    pub fn list_run_ids(&self) -> Result<Vec<String>, JournalError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(self.control_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// One entry in the workspace registry: a workspace this user has
/// opened before, with a stable sequential id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceEntry {
    pub id: u64,
    pub path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    entries: Vec<WorkspaceEntry>,
    last_used_id: Option<u64>,
}

/// Tracks every workspace this user has opened, assigning sequential
/// ids and remembering which was used last — purely a convenience
/// index for an (out-of-core) workspace-selection UI; the engine
/// itself never reads it.
pub struct WorkspaceRegistry {
    path: PathBuf,
    state: RegistryFile,
}

impl WorkspaceRegistry {
    pub fn open(registry_path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = registry_path.into();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            RegistryFile::default()
        };
        Ok(Self { path, state })
    }

    fn persist(&self) -> Result<(), JournalError> {
        let tmp_path = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&self.state)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Register `path`, returning its existing id if already known or
    /// assigning the next sequential id otherwise. Marks it as last-used.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> Result<u64, JournalError> {
        let path = path.into();
        let id = match self.state.entries.iter().find(|e| e.path == path) {
            Some(existing) => existing.id,
            None => {
                let next_id = self.state.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
                self.state.entries.push(WorkspaceEntry {
                    id: next_id,
                    path: path.clone(),
                });
                next_id
            }
        };
        self.state.last_used_id = Some(id);
        self.persist()?;
        Ok(id)
    }

    pub fn last_used(&self) -> Option<&WorkspaceEntry> {
        let id = self.state.last_used_id?;
        self.state.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[WorkspaceEntry] {
        &self.state.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_control_dir_and_version_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert!(ws.control_dir().join(VERSION_FILE).is_file());
        assert_eq!(ws.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::open(dir.path()).unwrap();
        let ws2 = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws2.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn run_exists_false_until_directory_created() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert!(!ws.run_exists("r1"));
        std::fs::create_dir_all(ws.run_dir("r1")).unwrap();
        assert!(ws.run_exists("r1"));
    }

    #[test]
    fn list_run_ids_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        std::fs::create_dir_all(ws.run_dir("b")).unwrap();
        std::fs::create_dir_all(ws.run_dir("a")).unwrap();
        assert_eq!(ws.list_run_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn registry_assigns_sequential_ids_and_tracks_last_used() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.json");
        let mut registry = WorkspaceRegistry::open(&registry_path).unwrap();

        let id1 = registry.register("/ws/one").unwrap();
        let id2 = registry.register("/ws/two").unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(registry.last_used().unwrap().path, PathBuf::from("/ws/two"));

        // Re-registering an existing path returns the same id and
        // doesn't create a duplicate entry.
        let id1_again = registry.register("/ws/one").unwrap();
        assert_eq!(id1_again, 1);
        assert_eq!(registry.entries().len(), 2);
        assert_eq!(registry.last_used().unwrap().path, PathBuf::from("/ws/one"));

        // Reopen from disk and confirm state survived.
        let reopened = WorkspaceRegistry::open(&registry_path).unwrap();
        assert_eq!(reopened.entries().len(), 2);
        assert_eq!(reopened.last_used().unwrap().id, 1);
    }
}
