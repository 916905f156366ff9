/*!
 * Process Module
 * Fork guard, child reaping, restart policies and the supervision loop
 */

pub mod child;
pub mod fork_guard;
pub mod policy;
pub mod reaper;
pub mod status;
pub mod supervisor;
mod supervisor_builder;

// Re-export for convenience
pub use child::ChildSlot;
pub use fork_guard::{checked_fork, thread_count, ForkGuard, ThreadProbe};
pub use policy::{restart_on_signal, LaunchPolicy};
pub use reaper::{OsReaper, Reaper};
pub use status::TerminationStatus;
pub use supervisor::{
    ChildRoutine, LogCallback, PostforkHook, PreforkHook, PrerestartHook, RestartCheck,
    SpawnRoutine, Supervisor,
};
pub use supervisor_builder::SupervisorBuilder;
