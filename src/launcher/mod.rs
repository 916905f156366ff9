/*!
 * Launcher
 * Glue for supervising an external program from the command line
 */

pub mod config;
pub mod exec;

pub use config::{parse_signal, LauncherConfig};
pub use exec::ExecSpawner;
