/*!
 * Child Reaper
 * Blocking wait for the next terminated descendant
 */

use super::status::TerminationStatus;
use crate::core::{Pid, SupervisorError, SupervisorResult};
use nix::errno::Errno;
use nix::sys::wait::waitpid;
use tracing::debug;

/// waitpid(2) wildcard
const ANY_CHILD: Pid = Pid::from_raw(-1);

/// Source of child termination events
pub trait Reaper: Send {
    /// Block until any child of the calling process terminates
    fn wait_any(&mut self) -> SupervisorResult<TerminationStatus>;
}

/// Reaper backed by `waitpid(-1, 0)`
#[derive(Debug, Default, Clone, Copy)]
pub struct OsReaper;

impl OsReaper {
    pub fn new() -> Self {
        Self
    }
}

impl Reaper for OsReaper {
    fn wait_any(&mut self) -> SupervisorResult<TerminationStatus> {
        loop {
            match waitpid(ANY_CHILD, None) {
                Ok(status) => match TerminationStatus::from_wait_status(status) {
                    Some(termination) => return Ok(termination),
                    None => debug!(?status, "Ignoring non-terminal wait status"),
                },
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(SupervisorError::Wait(e)),
            }
        }
    }
}
