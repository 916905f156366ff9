/*!
 * Exec Spawner
 *
 * Creation routine that replaces the child image with an external program.
 * Goes through std::process::Command, which is sound in a multi-threaded
 * process, so it works while a signal bridge thread is running.
 */

use crate::core::{Pid, Signal, SupervisorError, SupervisorResult};
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::info;

/// Spawns `program args...` as the supervised child
#[derive(Debug, Clone)]
pub struct ExecSpawner {
    program: OsString,
    args: Vec<OsString>,
    death_signal: Signal,
}

impl ExecSpawner {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            death_signal: crate::core::limits::LAUNCHER_DEATH_SIGNAL,
        }
    }

    /// Signal the child receives when the supervisor dies
    pub fn with_death_signal(mut self, signal: Signal) -> Self {
        self.death_signal = signal;
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Start the program and return its pid
    ///
    /// The child starts with every signal at its default disposition and
    /// with the death signal armed. The `Child` handle is dropped without
    /// waiting: the supervisor reaps by pid.
    pub fn spawn(&self) -> SupervisorResult<Pid> {
        let death_signal = self.death_signal as libc::c_int;
        let max_signal = libc::SIGRTMAX();

        let mut command = Command::new(&self.program);
        command.args(&self.args);

        // SAFETY: only async-signal-safe calls (signal, prctl) run between fork and exec.
        unsafe {
            command.pre_exec(move || {
                for signo in 1..=max_signal {
                    // SIGKILL/SIGSTOP and glibc-reserved signals fail, which is fine
                    libc::signal(signo, libc::SIG_DFL);
                }
                if libc::prctl(libc::PR_SET_PDEATHSIG, death_signal as libc::c_ulong, 0, 0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(|source| SupervisorError::Launch {
            program: self.program.to_string_lossy().into_owned(),
            source,
        })?;

        let pid = Pid::from_raw(child.id() as i32);
        info!(pid = %pid, program = %self.program.to_string_lossy(), "Launched child");
        Ok(pid)
    }
}
