/*!
 * Signal Dispositions
 * Low-level sigaction(2) helpers. SA_RESTART is always enabled.
 */

use crate::core::{Signal, SupervisorError, SupervisorResult};
use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};

/// Plain catcher: `fn(signo)`
pub type CatcherFn = extern "C" fn(libc::c_int);

/// Extended catcher: `fn(signo, siginfo, ucontext)`
pub type ActionFn = extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void);

/// Installed disposition of a signal as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    /// Address of the installed catcher
    Custom(usize),
}

impl Disposition {
    /// Whether `catcher` is the installed handler
    pub fn is_catcher(&self, catcher: CatcherFn) -> bool {
        matches!(self, Disposition::Custom(addr) if *addr == catcher as usize)
    }
}

/// Install `handler` for `signal` with an empty mask, returning the previous action
pub fn install(signal: Signal, handler: SigHandler, flags: SaFlags) -> SupervisorResult<SigAction> {
    let action = SigAction::new(handler, flags | SaFlags::SA_RESTART, SigSet::empty());
    // SAFETY: callers only install async-signal-safe catchers or SIG_DFL/SIG_IGN.
    unsafe { sigaction(signal, &action) }.map_err(|source| SupervisorError::SignalSetup {
        signal: signal as i32,
        source,
    })
}

/// Install a plain signal catcher
pub fn setup_signal_catcher(signal: Signal, catcher: CatcherFn) -> SupervisorResult<SigAction> {
    install(signal, SigHandler::Handler(catcher), SaFlags::empty())
}

/// Install an extended, siginfo-aware signal catcher
pub fn setup_signal_action(signal: Signal, action: ActionFn) -> SupervisorResult<SigAction> {
    install(signal, SigHandler::SigAction(action), SaFlags::SA_SIGINFO)
}

/// Restore the default OS disposition
pub fn reset_signal(signal: Signal) -> SupervisorResult<SigAction> {
    install(signal, SigHandler::SigDfl, SaFlags::empty())
}

/// Query the installed disposition without changing it
pub fn query_disposition(signal: Signal) -> SupervisorResult<Disposition> {
    // SAFETY: all-zero is a valid sigaction; a null new action only reads.
    let mut current: libc::sigaction = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::sigaction(signal as libc::c_int, std::ptr::null(), &mut current) };
    if rc != 0 {
        return Err(SupervisorError::SignalSetup {
            signal: signal as i32,
            source: Errno::last(),
        });
    }

    Ok(match current.sa_sigaction {
        libc::SIG_DFL => Disposition::Default,
        libc::SIG_IGN => Disposition::Ignore,
        addr => Disposition::Custom(addr),
    })
}
