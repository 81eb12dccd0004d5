use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::DaemonError;

/// Write the current process PID to `path` (§C: PID file + staleness check).
pub fn write_pid_file(path: &Path) -> Result<(), DaemonError> {
    let pid = std::process::id();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{pid}\n"))?;
    debug!(event = "daemon.pid.write_completed", pid = pid, path = %path.display());
    Ok(())
}

/// Read the PID from `path`. Returns `None` if missing or unparsable.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(event = "daemon.pid.read_failed", path = %path.display(), error = %e);
            return None;
        }
    };
    match content.trim().parse::<u32>() {
        Ok(pid) => Some(pid),
        Err(_) => {
            warn!(event = "daemon.pid.parse_failed", path = %path.display());
            None
        }
    }
}

pub fn remove_pid_file(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DaemonError::Io(e)),
    }
}

/// `kill(pid, 0)`: checks existence without sending a signal.
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// `Some(pid)` if a live daemon owns `pid_path`; cleans up and returns `None`
/// if the file is stale (process no longer alive).
pub fn check_daemon_running(pid_path: &Path) -> Option<u32> {
    let pid = read_pid_file(pid_path)?;
    if is_process_alive(pid) {
        Some(pid)
    } else {
        warn!(event = "daemon.pid.stale_detected", pid = pid, path = %pid_path.display());
        let _ = remove_pid_file(pid_path);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prise.pid");
        write_pid_file(&path).unwrap();
        assert_eq!(read_pid_file(&path), Some(std::process::id()));
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_pid_file(&dir.path().join("missing.pid")).is_none());
    }

    #[test]
    fn read_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prise.pid");
        fs::write(&path, "not-a-pid").unwrap();
        assert!(read_pid_file(&path).is_none());
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn unlikely_pid_is_not_alive() {
        assert!(!is_process_alive(4_294_967));
    }

    #[test]
    fn stale_pid_file_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prise.pid");
        fs::write(&path, "4294967\n").unwrap();
        assert!(check_daemon_running(&path).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn live_pid_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prise.pid");
        write_pid_file(&path).unwrap();
        assert_eq!(check_daemon_running(&path), Some(std::process::id()));
    }
}
