/*!
 * Launcher Configuration
 * Command line and environment settings for the `supervise` binary
 */

use crate::core::limits::LAUNCHER_DEATH_SIGNAL;
use crate::core::Signal;
use crate::process::LaunchPolicy;
use clap::Parser;
use std::ffi::OsString;
use std::str::FromStr;
use std::time::Duration;

/// Run a program and relaunch it when it dies
#[derive(Debug, Clone, Parser)]
#[command(name = "supervise", version, about)]
pub struct LauncherConfig {
    /// Signal delivered to the child if the supervisor dies
    #[arg(
        long,
        env = "SUPERVISOR_DEATH_SIGNAL",
        default_value = LAUNCHER_DEATH_SIGNAL.as_str(),
        value_parser = parse_signal
    )]
    pub death_signal: Signal,

    /// Seconds to wait before relaunching a child that exited non-zero
    #[arg(long, env = "SUPERVISOR_FAILURE_DELAY", default_value_t = 2)]
    pub failure_delay: u64,

    /// Signals forwarded from the supervisor to the child
    #[arg(
        long,
        env = "SUPERVISOR_FORWARD",
        value_delimiter = ',',
        default_value = "TERM,INT,HUP",
        value_parser = parse_signal
    )]
    pub forward: Vec<Signal>,

    /// Child termination signals that end supervision instead of relaunching
    #[arg(
        long = "stop-on",
        env = "SUPERVISOR_STOP_ON",
        value_delimiter = ',',
        default_value = "INT,TERM",
        value_parser = parse_signal
    )]
    pub stop_on: Vec<Signal>,

    /// Program to supervise, followed by its arguments
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub command: Vec<OsString>,
}

impl LauncherConfig {
    pub fn program(&self) -> &OsString {
        &self.command[0]
    }

    pub fn args(&self) -> &[OsString] {
        &self.command[1..]
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_secs(self.failure_delay)
    }

    pub fn policy(&self) -> LaunchPolicy {
        LaunchPolicy::new(self.stop_on.clone(), self.failure_delay())
    }
}

/// Parse `TERM`, `SIGTERM`, `sigterm` or `15`
pub fn parse_signal(value: &str) -> Result<Signal, String> {
    let value = value.trim();
    if let Ok(number) = value.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| format!("unknown signal number {}", number));
    }

    let upper = value.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&name).map_err(|_| format!("unknown signal '{}'", value))
}
