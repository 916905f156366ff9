/*!
 * Process Supervisor
 *
 * Runs one child at a time and relaunches it according to a restart policy.
 *
 * Cycle:
 * ```text
 * loop {
 *   ├─► pre-fork hook
 *   ├─► creation routine (default: fork guard + child routine)
 *   ├─► post-fork hook(pid)
 *   ├─► wait for any child, logging every termination,
 *   │   until the reaped pid is the one just created
 *   ├─► restart check(status) (default: restart iff signaled)
 *   ├─► no restart ─► return exit code (0 if signaled)
 *   └─► pre-restart hook, continue
 * }
 * ```
 */

use super::child::ChildSlot;
use super::fork_guard::ForkGuard;
use super::policy::restart_on_signal;
use super::reaper::Reaper;
use super::status::TerminationStatus;
use super::supervisor_builder::SupervisorBuilder;
use crate::core::limits::{BAD_CHILD_ROUTINE_EXIT, CHILD_PANIC_EXIT, CHILD_SETUP_EXIT};
use crate::core::{Pid, Signal, SupervisorError, SupervisorResult};
use crate::monitoring::span_cycle;
use nix::errno::Errno;
use nix::sys::prctl;
use nix::unistd::ForkResult;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

pub type PreforkHook = Box<dyn FnMut() + Send>;
pub type PostforkHook = Box<dyn FnMut(Pid) + Send>;
pub type PrerestartHook = Box<dyn FnMut() + Send>;
pub type LogCallback = Box<dyn FnMut(&str) + Send>;
pub type RestartCheck = Box<dyn FnMut(&TerminationStatus) -> bool + Send>;
/// Creates the child and returns its pid
pub type SpawnRoutine = Box<dyn FnMut() -> SupervisorResult<Pid> + Send>;
/// Code run inside a forked child; its return value is the exit code
pub type ChildRoutine = Box<dyn FnMut() -> i32 + Send>;

/// Single-child supervisor
///
/// # Example
///
/// ```no_run
/// use proc_supervisor::Supervisor;
///
/// let mut supervisor = Supervisor::builder()
///     .with_child_routine(|| 7)
///     .with_restart_check(|_| false)
///     .build();
/// let code = supervisor.start()?;
/// assert_eq!(code, 7);
/// # Ok::<(), proc_supervisor::SupervisorError>(())
/// ```
pub struct Supervisor {
    pub(super) prefork: Option<PreforkHook>,
    pub(super) postfork: Option<PostforkHook>,
    pub(super) prerestart: Option<PrerestartHook>,
    pub(super) log: Option<LogCallback>,
    pub(super) restart_check: Option<RestartCheck>,
    pub(super) spawn: Option<SpawnRoutine>,
    pub(super) child: Option<ChildRoutine>,
    pub(super) child_signal: Signal,
    pub(super) guard: ForkGuard,
    pub(super) reaper: Box<dyn Reaper>,
    pub(super) slot: Option<Arc<ChildSlot>>,
    pub(super) cycles: u64,
}

impl Supervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Death signal configured in children created by the default routine
    pub fn child_signal(&self) -> Signal {
        self.child_signal
    }

    /// Completed supervision cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Shared current-child slot, if one was configured
    pub fn child_slot(&self) -> Option<&Arc<ChildSlot>> {
        self.slot.as_ref()
    }

    /// Supervise until the restart check declines a restart
    ///
    /// Returns the last child's exit code, or 0 if it was killed by a signal.
    pub fn start(&mut self) -> SupervisorResult<i32> {
        loop {
            let span = span_cycle(self.cycles + 1);
            let _entered = span.enter();

            if let Some(prefork) = self.prefork.as_mut() {
                prefork();
            }

            let pid = match self.spawn.as_mut() {
                Some(spawn) => spawn()?,
                None => self.default_spawn()?,
            };
            span.record("pid", pid.as_raw());

            if let Some(slot) = &self.slot {
                slot.set(pid);
            }
            if let Some(postfork) = self.postfork.as_mut() {
                postfork(pid);
            }

            let status = self.wait_for(pid)?;
            if let Some(slot) = &self.slot {
                slot.clear();
            }
            self.cycles += 1;

            let restart = match self.restart_check.as_mut() {
                Some(check) => check(&status),
                None => restart_on_signal(&status),
            };
            let code = status.exit_code();
            debug!(pid = %pid, status = %status, restart = restart, "Child terminated");

            if !restart {
                return Ok(code);
            }
            if let Some(prerestart) = self.prerestart.as_mut() {
                prerestart();
            }
        }
    }

    /// Wait until `pid` terminates, logging every reaped child on the way
    fn wait_for(&mut self, pid: Pid) -> SupervisorResult<TerminationStatus> {
        loop {
            let status = self.reaper.wait_any()?;
            if let Some(log) = self.log.as_mut() {
                log(&status.to_string());
            }
            if status.pid() == pid {
                return Ok(status);
            }
            debug!(reaped = %status.pid(), supervised = %pid, "Reaped unrelated child");
        }
    }

    fn default_spawn(&mut self) -> SupervisorResult<Pid> {
        match self.guard.fork()? {
            ForkResult::Parent { child } => Ok(child),
            ForkResult::Child => self.run_child(),
        }
    }

    /// Child branch of the default creation routine. Never returns.
    ///
    /// Only stderr is used for diagnostics here: the forked child must not
    /// touch state owned by the parent's logging subscriber.
    fn run_child(&mut self) -> ! {
        let setup = prctl::set_pdeathsig(self.child_signal);
        let code = child_exit_code(setup, self.child.as_mut());
        std::process::exit(code)
    }
}

/// Exit code of a forked child, given its death-signal setup result
///
/// Without the parent-death signal the child could outlive its supervisor,
/// so the routine is not run in that case.
fn child_exit_code(setup: Result<(), Errno>, routine: Option<&mut ChildRoutine>) -> i32 {
    if let Err(e) = setup {
        eprintln!("Can't set parent death signal: {}", e);
        return CHILD_SETUP_EXIT;
    }
    match routine {
        // Unwinding out of here would run the parent's loop in the child
        Some(routine) => {
            panic::catch_unwind(AssertUnwindSafe(routine)).unwrap_or(CHILD_PANIC_EXIT)
        }
        None => {
            eprintln!("{}", SupervisorError::BadChildRoutine);
            BAD_CHILD_ROUTINE_EXIT
        }
    }
}
