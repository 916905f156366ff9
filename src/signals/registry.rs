/*!
 * Signal Ownership Registry
 *
 * Process-wide table mapping a signal number to the bridge that currently
 * owns it. The catcher installed for every registered signal is a single
 * trampoline that looks up the owner's pipe write end here.
 *
 * Only atomics are touched from the trampoline. Registration and release
 * must be serialized by the caller.
 */

use super::bridge::write_signal_byte;
use crate::core::limits::SIGNAL_SLOTS;
use crate::core::{SignalNumber, SupervisorError, SupervisorResult};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

const NO_FD: RawFd = -1;
const NO_OWNER: u64 = 0;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_FD: AtomicI32 = AtomicI32::new(NO_FD);
#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_OWNER: AtomicU64 = AtomicU64::new(NO_OWNER);

static WRITE_FDS: [AtomicI32; SIGNAL_SLOTS] = [EMPTY_FD; SIGNAL_SLOTS];
static OWNERS: [AtomicU64; SIGNAL_SLOTS] = [EMPTY_OWNER; SIGNAL_SLOTS];
static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a unique, non-zero bridge identifier
pub(crate) fn next_bridge_id() -> u64 {
    NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed)
}

fn slot(signo: SignalNumber) -> SupervisorResult<usize> {
    usize::try_from(signo)
        .ok()
        .filter(|&idx| idx > 0 && idx < SIGNAL_SLOTS)
        .ok_or(SupervisorError::InvalidSignal(signo))
}

/// Record `owner` as the bridge notified for `signo`, replacing any previous owner
pub(crate) fn claim(signo: SignalNumber, owner: u64, write_fd: RawFd) -> SupervisorResult<()> {
    let idx = slot(signo)?;
    WRITE_FDS[idx].store(write_fd, Ordering::Release);
    OWNERS[idx].store(owner, Ordering::Release);
    Ok(())
}

/// Drop the registration for `signo` if `owner` still holds it
///
/// Returns true when the registration was removed.
pub(crate) fn release(signo: SignalNumber, owner: u64) -> bool {
    let Ok(idx) = slot(signo) else {
        return false;
    };
    if OWNERS[idx]
        .compare_exchange(owner, NO_OWNER, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        WRITE_FDS[idx].store(NO_FD, Ordering::Release);
        true
    } else {
        false
    }
}

/// Current owner of `signo`, if any
pub(crate) fn owner_of(signo: SignalNumber) -> Option<u64> {
    let idx = slot(signo).ok()?;
    match OWNERS[idx].load(Ordering::Acquire) {
        NO_OWNER => None,
        id => Some(id),
    }
}

/// Catcher installed for every bridged signal. Runs in interrupt context.
pub(crate) extern "C" fn trampoline(signo: libc::c_int) {
    let Ok(idx) = usize::try_from(signo) else {
        return;
    };
    if idx >= SIGNAL_SLOTS {
        return;
    }
    let fd = WRITE_FDS[idx].load(Ordering::Acquire);
    if fd != NO_FD {
        // A full pipe drops the notification
        let _ = write_signal_byte(fd, signo);
    }
}
