/*!
 * Signals Module
 * Self-pipe bridge from OS signals into ordinary thread context
 */

mod bridge;
pub mod disposition;
mod registry;

// Re-export public API
pub use bridge::{MessageHandler, SignalBridge};
pub use disposition::{ActionFn, CatcherFn, Disposition};
