/*!
 * Supervisor Builder
 * Builder pattern for Supervisor construction
 */

use super::child::ChildSlot;
use super::fork_guard::ForkGuard;
use super::reaper::{OsReaper, Reaper};
use super::status::TerminationStatus;
use super::supervisor::{
    ChildRoutine, LogCallback, PostforkHook, PreforkHook, PrerestartHook, RestartCheck,
    SpawnRoutine, Supervisor,
};
use crate::core::limits::DEFAULT_CHILD_DEATH_SIGNAL;
use crate::core::{Pid, Signal, SupervisorResult};
use std::sync::Arc;

/// Builder for Supervisor
///
/// Every hook is optional. Omitted hooks are skipped, an omitted restart
/// check means "restart iff signaled" and an omitted creation routine means
/// fork through the [`ForkGuard`] and run the child routine.
pub struct SupervisorBuilder {
    prefork: Option<PreforkHook>,
    postfork: Option<PostforkHook>,
    prerestart: Option<PrerestartHook>,
    log: Option<LogCallback>,
    restart_check: Option<RestartCheck>,
    spawn: Option<SpawnRoutine>,
    child: Option<ChildRoutine>,
    child_signal: Signal,
    guard: ForkGuard,
    reaper: Option<Box<dyn Reaper>>,
    slot: Option<Arc<ChildSlot>>,
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            prefork: None,
            postfork: None,
            prerestart: None,
            log: None,
            restart_check: None,
            spawn: None,
            child: None,
            child_signal: DEFAULT_CHILD_DEATH_SIGNAL,
            guard: ForkGuard::new(),
            reaper: None,
            slot: None,
        }
    }

    /// Hook run right before each child is created
    pub fn with_prefork<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.prefork = Some(Box::new(hook));
        self
    }

    /// Hook run with the new pid right after creation
    ///
    /// A creation routine that returns in both parent and child runs this twice.
    pub fn with_postfork<F>(mut self, hook: F) -> Self
    where
        F: FnMut(Pid) + Send + 'static,
    {
        self.postfork = Some(Box::new(hook));
        self
    }

    /// Hook run after a restart has been decided
    pub fn with_prerestart<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.prerestart = Some(Box::new(hook));
        self
    }

    /// Receives a description of every reaped child
    pub fn with_log<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.log = Some(Box::new(callback));
        self
    }

    /// Replace the default restart policy entirely
    pub fn with_restart_check<F>(mut self, check: F) -> Self
    where
        F: FnMut(&TerminationStatus) -> bool + Send + 'static,
    {
        self.restart_check = Some(Box::new(check));
        self
    }

    /// Custom child creation; bypasses the fork guard and child routine
    pub fn with_spawn_routine<F>(mut self, spawn: F) -> Self
    where
        F: FnMut() -> SupervisorResult<Pid> + Send + 'static,
    {
        self.spawn = Some(Box::new(spawn));
        self
    }

    /// Code the default creation routine runs in the forked child
    pub fn with_child_routine<F>(mut self, routine: F) -> Self
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        self.child = Some(Box::new(routine));
        self
    }

    /// Signal delivered to default-routine children when the supervisor dies
    pub fn with_child_signal(mut self, signal: Signal) -> Self {
        self.child_signal = signal;
        self
    }

    /// Fork guard used by the default creation routine
    pub fn with_fork_guard(mut self, guard: ForkGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Source of termination events (default: waitpid)
    pub fn with_reaper<R>(mut self, reaper: R) -> Self
    where
        R: Reaper + 'static,
    {
        self.reaper = Some(Box::new(reaper));
        self
    }

    /// Slot updated with the current child's pid, e.g. for signal forwarding
    pub fn with_child_slot(mut self, slot: Arc<ChildSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn build(self) -> Supervisor {
        Supervisor {
            prefork: self.prefork,
            postfork: self.postfork,
            prerestart: self.prerestart,
            log: self.log,
            restart_check: self.restart_check,
            spawn: self.spawn,
            child: self.child,
            child_signal: self.child_signal,
            guard: self.guard,
            reaper: self.reaper.unwrap_or_else(|| Box::new(OsReaper::new())),
            slot: self.slot,
            cycles: 0,
        }
    }
}
