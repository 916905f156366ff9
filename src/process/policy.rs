/*!
 * Restart Policies
 *
 * A restart policy maps a child's termination status to a restart decision.
 *
 * - [`restart_on_signal`]: default. Relaunch iff the child was killed by a signal.
 * - [`LaunchPolicy`]: the launcher's policy. Stop signals end supervision,
 *   any other signal relaunches, non-zero exits relaunch after a delay.
 */

use super::status::TerminationStatus;
use crate::core::limits::DEFAULT_FAILURE_DELAY;
use crate::core::Signal;
use std::time::Duration;

/// Default restart check: restart iff terminated by a signal (any signal)
pub fn restart_on_signal(status: &TerminationStatus) -> bool {
    status.signaled()
}

/// Restart policy used by the `supervise` launcher
#[derive(Debug, Clone)]
pub struct LaunchPolicy {
    stop_signals: Vec<Signal>,
    failure_delay: Duration,
}

impl Default for LaunchPolicy {
    /// Stops on SIGINT/SIGTERM, waits 2s before relaunching a failed child
    fn default() -> Self {
        Self {
            stop_signals: vec![Signal::SIGINT, Signal::SIGTERM],
            failure_delay: DEFAULT_FAILURE_DELAY,
        }
    }
}

impl LaunchPolicy {
    pub fn new(stop_signals: Vec<Signal>, failure_delay: Duration) -> Self {
        Self {
            stop_signals,
            failure_delay,
        }
    }

    pub fn stop_signals(&self) -> &[Signal] {
        &self.stop_signals
    }

    pub fn failure_delay(&self) -> Duration {
        self.failure_delay
    }

    /// Restart decision, without any delay
    pub fn should_restart(&self, status: &TerminationStatus) -> bool {
        match *status {
            TerminationStatus::Signaled { signal, .. } => !self.stop_signals.contains(&signal),
            TerminationStatus::Exited { code, .. } => code != 0,
        }
    }

    /// Pause to observe before relaunching, only for non-zero exits
    pub fn restart_delay(&self, status: &TerminationStatus) -> Option<Duration> {
        match *status {
            TerminationStatus::Exited { code, .. } if code != 0 => Some(self.failure_delay),
            _ => None,
        }
    }
}
