/*!
 * Termination Status
 * Result of waiting for a child, as consumed by restart policies
 */

use crate::core::{Pid, Signal};
use nix::sys::wait::WaitStatus;
use std::fmt;

/// How a child process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Exited normally with `code`
    Exited { pid: Pid, code: i32 },
    /// Terminated by `signal`
    Signaled {
        pid: Pid,
        signal: Signal,
        core_dumped: bool,
    },
}

impl TerminationStatus {
    /// Convert a wait status; stopped/continued children are not terminations
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(pid, code) => Some(TerminationStatus::Exited { pid, code }),
            WaitStatus::Signaled(pid, signal, core_dumped) => Some(TerminationStatus::Signaled {
                pid,
                signal,
                core_dumped,
            }),
            _ => None,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        match *self {
            TerminationStatus::Exited { pid, .. } | TerminationStatus::Signaled { pid, .. } => pid,
        }
    }

    #[inline]
    pub fn signaled(&self) -> bool {
        matches!(self, TerminationStatus::Signaled { .. })
    }

    #[inline]
    pub fn exited(&self) -> bool {
        matches!(self, TerminationStatus::Exited { .. })
    }

    /// Terminating signal, if any
    pub fn signal(&self) -> Option<Signal> {
        match *self {
            TerminationStatus::Signaled { signal, .. } => Some(signal),
            TerminationStatus::Exited { .. } => None,
        }
    }

    /// Status reported to the supervisor's caller: the exit code, or 0 when signaled
    pub fn exit_code(&self) -> i32 {
        match *self {
            TerminationStatus::Exited { code, .. } => code,
            TerminationStatus::Signaled { .. } => 0,
        }
    }
}

impl TryFrom<WaitStatus> for TerminationStatus {
    type Error = WaitStatus;

    fn try_from(status: WaitStatus) -> Result<Self, Self::Error> {
        Self::from_wait_status(status).ok_or(status)
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = self.signal().map(|s| s as i32).unwrap_or(0);
        write!(
            f,
            "child exits: pid={}, signaled={}, signal={}, exited={}, status={}",
            self.pid(),
            self.signaled(),
            signal,
            self.exited(),
            self.exit_code()
        )?;
        if let TerminationStatus::Signaled {
            core_dumped: true, ..
        } = self
        {
            write!(f, ", core dumped")?;
        }
        Ok(())
    }
}
