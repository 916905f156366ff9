/*!
 * Current Child Slot
 *
 * The pid of the currently supervised child, shared between the supervision
 * loop (writer) and signal forwarding (reader).
 *
 * There is no exclusion between the two: a signal drained just before the
 * supervisor records a new child, or just after the old one was reaped, is
 * either dropped or sent to a stale pid. This is an accepted limitation.
 */

use crate::core::{Pid, Signal, SignalNumber};
use nix::sys::signal::kill;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, warn};

const EMPTY: i32 = 0;

/// Last-writer-wins holder of the current child pid
#[derive(Debug, Default)]
pub struct ChildSlot {
    pid: AtomicI32,
}

impl ChildSlot {
    pub fn new() -> Self {
        Self {
            pid: AtomicI32::new(EMPTY),
        }
    }

    /// Record the current child; non-positive pids clear the slot
    pub fn set(&self, pid: Pid) {
        let raw = pid.as_raw();
        self.pid
            .store(if raw > 0 { raw } else { EMPTY }, Ordering::Release);
    }

    /// Forget the current child
    pub fn clear(&self) {
        self.pid.store(EMPTY, Ordering::Release);
    }

    pub fn get(&self) -> Option<Pid> {
        match self.pid.load(Ordering::Acquire) {
            EMPTY => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }

    /// Send `signo` to the current child
    ///
    /// Returns true if a signal was delivered to some process.
    pub fn forward(&self, signo: SignalNumber) -> bool {
        let Some(pid) = self.get() else {
            debug!(signal = signo, "No child to forward signal to");
            return false;
        };
        let signal = match Signal::try_from(signo) {
            Ok(signal) => signal,
            Err(_) => {
                warn!(signal = signo, "Not forwarding unknown signal");
                return false;
            }
        };

        match kill(pid, signal) {
            Ok(()) => {
                debug!(pid = %pid, signal = %signal, "Forwarded signal to child");
                true
            }
            Err(e) => {
                warn!(pid = %pid, signal = %signal, error = %e, "Failed to forward signal");
                false
            }
        }
    }
}
