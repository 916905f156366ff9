/*!
 * Supervisor Limits and Constants
 *
 * Centralized location for timeouts, exit codes and signal table sizes.
 * Linux-compatible values are marked with [LINUX-COMPAT]
 */

use nix::sys::signal::Signal;
use std::time::Duration;

// =============================================================================
// SIGNAL BRIDGE
// =============================================================================

/// Worker poll timeout (5s)
/// The worker wakes at least this often to observe the stop flag
pub const WORKER_POLL_TIMEOUT_MS: u16 = 5000;

/// Byte written to the shutdown pipe to wake the worker
/// Never sent through the data pipe
pub const SHUTDOWN_SENTINEL: u8 = 255;

/// Number of slots in the signal ownership table
/// [LINUX-COMPAT] Covers 0..=SIGRTMAX (64)
pub const SIGNAL_SLOTS: usize = 65;

/// Bytes read from the pipe per read(2) call while draining
pub const DRAIN_CHUNK: usize = 64;

// =============================================================================
// PROCESS SUPERVISION
// =============================================================================

/// Death signal the default creation routine configures in the child
/// [LINUX-COMPAT] PR_SET_PDEATHSIG
pub const DEFAULT_CHILD_DEATH_SIGNAL: Signal = Signal::SIGTERM;

/// Death signal used by the launcher for exec'd children
pub const LAUNCHER_DEATH_SIGNAL: Signal = Signal::SIGKILL;

/// Delay before relaunching a child that exited with a non-zero code
pub const DEFAULT_FAILURE_DELAY: Duration = Duration::from_secs(2);

/// Exit code of a forked child that has no routine to run (EX_SOFTWARE)
pub const BAD_CHILD_ROUTINE_EXIT: i32 = 70;

/// Exit code of a forked child whose parent-death signal could not be set (EX_OSERR)
pub const CHILD_SETUP_EXIT: i32 = 71;

/// Exit code of a forked child whose routine panicked (Rust's panic status)
pub const CHILD_PANIC_EXIT: i32 = 101;

/// Exit code used when the supervisor itself cannot continue
pub const FATAL_EXIT_CODE: i32 = 1;
