/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use super::limits::FATAL_EXIT_CODE;
use miette::Diagnostic;
use nix::errno::Errno;
use thiserror::Error;

/// Common result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Supervisor, fork guard and signal bridge errors
#[derive(Error, Debug, Diagnostic)]
pub enum SupervisorError {
    #[error("It is not safe to fork with {threads} active threads")]
    #[diagnostic(
        code(fork_guard::unsafe_fork),
        help("Fork before starting any threads, or supply a creation routine that execs (e.g. ExecSpawner).")
    )]
    UnsafeFork { threads: usize },

    #[error("Thread count unavailable: {0}")]
    #[diagnostic(
        code(fork_guard::thread_count_unavailable),
        help("/proc/self/status could not be read or has no Threads: line.")
    )]
    ThreadCountUnavailable(String),

    #[error("Can't fork process: {0}")]
    #[diagnostic(
        code(process::spawn_failed),
        help("Check process limits (ulimit -u) and available memory.")
    )]
    Spawn(#[source] Errno),

    #[error("Can't spawn process '{program}': {source}")]
    #[diagnostic(
        code(process::launch_failed),
        help("Check that the program exists, is executable and is on PATH.")
    )]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Undefined child routine")]
    #[diagnostic(
        code(supervisor::bad_child_routine),
        help("Set a child routine or supply a custom creation routine.")
    )]
    BadChildRoutine,

    #[error("Wait for child failed: {0}")]
    #[diagnostic(
        code(supervisor::wait_failed),
        help("ECHILD means the supervised child is not a child of this process.")
    )]
    Wait(#[source] Errno),

    #[error("Can't create signal pipe: {0}")]
    #[diagnostic(code(signals::channel_setup))]
    ChannelSetup(#[source] Errno),

    #[error("Signal pipe failure: {0}")]
    #[diagnostic(code(signals::channel_failed))]
    Channel(#[source] Errno),

    #[error("Can't start signal bridge worker: {0}")]
    #[diagnostic(code(signals::worker_spawn))]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Can't install disposition for signal {signal}: {source}")]
    #[diagnostic(
        code(signals::setup_failed),
        help("SIGKILL and SIGSTOP cannot be caught.")
    )]
    SignalSetup {
        signal: i32,
        #[source]
        source: Errno,
    },

    #[error("Invalid signal: {0}")]
    #[diagnostic(code(signals::invalid_signal))]
    InvalidSignal(i32),
}

/// Report an unrecoverable error and terminate the process.
pub fn fatal<E>(context: &str, err: E) -> !
where
    E: Diagnostic + Send + Sync + 'static,
{
    tracing::error!(context = context, error = %err, "fatal error, terminating");
    let report = miette::Report::new(err).wrap_err(context.to_string());
    eprintln!("{:?}", report);
    std::process::exit(FATAL_EXIT_CODE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SupervisorError::UnsafeFork { threads: 3 };
        assert_eq!(err.to_string(), "It is not safe to fork with 3 active threads");

        let err = SupervisorError::Spawn(Errno::EAGAIN);
        assert!(err.to_string().starts_with("Can't fork process"));

        let err = SupervisorError::SignalSetup {
            signal: 9,
            source: Errno::EINVAL,
        };
        assert!(err.to_string().contains("signal 9"));
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = SupervisorError::BadChildRoutine;
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("supervisor::bad_child_routine"));
    }
}
