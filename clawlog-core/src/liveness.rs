//! Process liveness probing.
//!
//! The run lock only needs a yes/no answer for "is PID N running?". The
//! platform mechanics live behind [`ProcessLivenessChecker`] so the lock
//! logic can be exercised with a fake.

/// Answers whether a process with the given PID currently exists.
pub trait ProcessLivenessChecker {
    fn is_alive(&self, pid: u32) -> bool;
}

impl<F> ProcessLivenessChecker for F
where
    F: Fn(u32) -> bool,
{
    fn is_alive(&self, pid: u32) -> bool {
        self(pid)
    }
}

/// The operating system's view of running processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessProbe;

#[cfg(unix)]
impl ProcessLivenessChecker for OsProcessProbe {
    /// `kill(pid, 0)`: delivers no signal, only checks existence.
    /// `EPERM` means the process exists but belongs to someone else.
    fn is_alive(&self, pid: u32) -> bool {
        // 0 and out-of-range values would address process groups.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs permission and existence checks only.
        if unsafe { libc::kill(pid, 0) } == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(windows)]
impl ProcessLivenessChecker for OsProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        let output = std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
            .output();
        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
                .contains(&format!("\"{pid}\"")),
            // Cannot tell: treat as alive so a live holder is never evicted.
            _ => true,
        }
    }
}

#[cfg(not(any(unix, windows)))]
impl ProcessLivenessChecker for OsProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        pid != 0
    }
}
