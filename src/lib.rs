/*!
 * Process Supervisor Library
 *
 * Supervises a single external process:
 * - Process supervision loop with pluggable fork, wait and restart policy
 * - Self-pipe signal bridge running signal handlers outside interrupt context
 * - Fork guard refusing to fork a multi-threaded process
 */

pub mod core;
pub mod launcher;
pub mod monitoring;
pub mod process;
pub mod signals;

// Re-exports
pub use crate::core::{fatal, Pid, Signal, SignalNumber, SupervisorError, SupervisorResult};
pub use launcher::{ExecSpawner, LauncherConfig};
pub use monitoring::init_tracing;
pub use process::{
    checked_fork, restart_on_signal, ChildSlot, ForkGuard, LaunchPolicy, OsReaper, Reaper,
    Supervisor, SupervisorBuilder, TerminationStatus,
};
pub use signals::{Disposition, SignalBridge};
