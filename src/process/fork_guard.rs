/*!
 * Fork Guard
 *
 * Refuses fork(2) while more than one thread is running. Only the calling
 * thread is duplicated, so locks held by the other threads would stay locked
 * forever in the child. The check is best-effort, not a guarantee: a thread
 * may be started between the check and the fork.
 */

use crate::core::{SupervisorError, SupervisorResult};
use nix::unistd::{fork, ForkResult};
use std::fs;
use tracing::{debug, warn};

const PROC_STATUS: &str = "/proc/self/status";

/// Thread counting function used by the guard
pub type ThreadProbe = fn() -> SupervisorResult<usize>;

/// Number of threads in the calling process, from /proc/self/status
pub fn thread_count() -> SupervisorResult<usize> {
    let status = fs::read_to_string(PROC_STATUS)
        .map_err(|e| SupervisorError::ThreadCountUnavailable(format!("{}: {}", PROC_STATUS, e)))?;
    parse_thread_count(&status).ok_or_else(|| {
        SupervisorError::ThreadCountUnavailable(format!("no Threads: line in {}", PROC_STATUS))
    })
}

fn parse_thread_count(status: &str) -> Option<usize> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|value| value.trim().parse().ok())
}

/// Pre-fork thread check
#[derive(Debug, Clone, Copy)]
pub struct ForkGuard {
    probe: ThreadProbe,
}

impl Default for ForkGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkGuard {
    /// Guard that counts threads through procfs
    pub fn new() -> Self {
        Self {
            probe: thread_count,
        }
    }

    /// Guard with a custom thread probe
    ///
    /// The probe's answer is trusted: a probe reporting one thread in a
    /// multi-threaded process disables the protection.
    pub fn with_probe(probe: ThreadProbe) -> Self {
        Self { probe }
    }

    /// Fail with `UnsafeFork` if more than one thread is active
    ///
    /// An unavailable count is logged and treated as safe.
    pub fn check(&self) -> SupervisorResult<()> {
        match (self.probe)() {
            Ok(threads) if threads > 1 => {
                warn!(threads = threads, "Refusing to fork a multi-threaded process");
                Err(SupervisorError::UnsafeFork { threads })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Thread count unavailable, forking anyway");
                Ok(())
            }
        }
    }

    /// Check the thread count, then fork
    pub fn fork(&self) -> SupervisorResult<ForkResult> {
        self.check()?;
        // SAFETY: the check above found a single-threaded process, so no
        // other thread can hold a lock across the fork.
        let result = unsafe { fork() }.map_err(SupervisorError::Spawn)?;
        if let ForkResult::Parent { child } = result {
            debug!(child = %child, "Forked child process");
        }
        Ok(result)
    }
}

/// Fork through a default [`ForkGuard`]
pub fn checked_fork() -> SupervisorResult<ForkResult> {
    ForkGuard::new().fork()
}
