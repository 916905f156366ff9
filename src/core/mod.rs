/*!
 * Core Module
 * Fundamental supervisor types, constants and error handling
 */

pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use types::*;
