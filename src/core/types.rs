/*!
 * Core Types
 * Common types used across the supervisor
 */

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;

/// Raw signal number as delivered to catchers and bridge handlers
pub type SignalNumber = i32;
