//! PID/hostname/process-name liveness probing.
//!
//! Shared by the Janitor and the session subsystem's stale socket
//! detection, since both need the same "is the process that claims to
//! own this resource still the one that started it" check.

use sysinfo::{Pid, System};

/// The local machine's hostname, as recorded into run metadata.
pub fn local_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown-host".to_string())
}

/// This process's own executable name, as recorded into run metadata
/// for later liveness comparison.
pub fn current_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "delta-engine".to_string())
}

/// Outcome of probing whether a recorded PID is still the process that
/// recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// PID exists and its process name matches what was recorded.
    Alive,
    /// PID does not exist.
    Gone,
    /// PID exists but belongs to a different process (reused).
    Reused,
}

/// Triple-check liveness: PID exists, process name matches, and
/// (by the caller comparing `recorded_hostname` to [`local_hostname`])
/// hostname matches. Hostname comparison is the caller's responsibility
/// because it gates a *different* decision (refuse vs. treat as orphan).
pub fn probe(pid: u32, expected_process_name: &str) -> Liveness {
    let mut sys = System::new();
    let pid = Pid::from_u32(pid);
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    match sys.process(pid) {
        None => Liveness::Gone,
        Some(proc) => {
            let actual_name = proc.name().to_string_lossy();
            if actual_name == expected_process_name {
                Liveness::Alive
            } else {
                Liveness::Reused
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive_under_its_own_name() {
        let name = current_process_name();
        let outcome = probe(std::process::id(), &name);
        assert_eq!(outcome, Liveness::Alive);
    }

    #[test]
    fn nonexistent_pid_is_gone() {
        // PID 1 belongs to init in most containers, so probe a PID far
        // beyond any plausible process table instead.
        let outcome = probe(u32::MAX - 1, "nonexistent-process-name");
        assert_eq!(outcome, Liveness::Gone);
    }

    #[test]
    fn live_pid_with_wrong_name_is_reused() {
        let outcome = probe(std::process::id(), "definitely-not-our-binary-name");
        assert_eq!(outcome, Liveness::Reused);
    }

    #[test]
    fn hostname_is_nonempty() {
        assert!(!local_hostname().is_empty());
    }
}
