/*!
 * Signal Bridge
 *
 * Self-pipe signal handling. Signal catchers run in interrupt context and
 * only write the signal number as a single byte into a non-blocking pipe.
 * A dedicated worker thread waits on the read end and runs the user handler
 * for every drained byte in normal execution context, so the handler may
 * allocate, lock, log or kill.
 *
 * Terminology:
 * - Signal catcher: low-level OS handler. Must be async-signal-safe.
 * - Signal handler: application-side callback run by the worker thread.
 *
 * Shutdown goes through a second pipe, so every data byte (255 included) is
 * delivered to the handler. The worker drains the data pipe once more after
 * observing the stop flag, then exits.
 */

use super::disposition::{self, ActionFn, CatcherFn, Disposition};
use super::registry;
use crate::core::limits::{DRAIN_CHUNK, SHUTDOWN_SENTINEL, WORKER_POLL_TIMEOUT_MS};
use crate::core::{fatal, Signal, SignalNumber, SupervisorError, SupervisorResult};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::SigAction;
use nix::unistd::pipe2;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Application-side signal handler
pub type MessageHandler = Arc<dyn Fn(SignalNumber) + Send + Sync>;

/// Write one signal byte to `fd`, preserving the caller's errno.
///
/// Async-signal-safe: a single non-blocking write(2) and no allocation.
pub(crate) fn write_signal_byte(fd: RawFd, signo: SignalNumber) -> Result<(), Errno> {
    let saved = Errno::last_raw();
    let byte = [signo as u8];
    // SAFETY: `byte` is a valid one-byte buffer for the duration of the call.
    let written = unsafe { libc::write(fd, byte.as_ptr().cast(), 1) };
    let result = if written == 1 { Ok(()) } else { Err(Errno::last()) };
    Errno::set_raw(saved);
    result
}

struct Shared {
    read_fd: OwnedFd,
    write_fd: OwnedFd,
    /// Out-of-band shutdown pipe; data bytes are never interpreted
    stop_read: OwnedFd,
    stop_write: OwnedFd,
    poll_timeout: PollTimeout,
    handler: RwLock<Option<MessageHandler>>,
    stopping: AtomicBool,
}

impl Shared {
    fn new(poll_timeout: PollTimeout) -> SupervisorResult<Self> {
        let (read_fd, write_fd) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(SupervisorError::ChannelSetup)?;
        let (stop_read, stop_write) = pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(SupervisorError::ChannelSetup)?;

        Ok(Self {
            read_fd,
            write_fd,
            stop_read,
            stop_write,
            poll_timeout,
            handler: RwLock::new(None),
            stopping: AtomicBool::new(false),
        })
    }

    fn dispatch(&self, signo: SignalNumber) {
        // Clone out so the handler runs without holding the lock
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            // A panicking handler must not take the worker down with it
            if panic::catch_unwind(AssertUnwindSafe(|| handler(signo))).is_err() {
                error!(signal = signo, "Signal handler panicked, message dropped");
            }
        }
    }

    fn read_chunk(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe {
            libc::read(self.read_fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
        };
        Errno::result(n).map(|n| n as usize)
    }

    /// Read every pending byte and dispatch it in FIFO order
    fn drain(&self) {
        let mut buf = [0u8; DRAIN_CHUNK];
        loop {
            let n = match self.read_chunk(&mut buf) {
                Ok(0) | Err(Errno::EAGAIN) => return,
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => fatal("unhandled error on signal pipe read", SupervisorError::Channel(e)),
            };

            for &byte in &buf[..n] {
                self.dispatch(SignalNumber::from(byte));
            }
        }
    }

    /// Wait until either pipe is readable or the poll timeout expires
    fn wait(&self) {
        loop {
            let mut fds = [
                PollFd::new(self.read_fd.as_fd(), PollFlags::POLLIN),
                PollFd::new(self.stop_read.as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, self.poll_timeout) {
                Ok(_) => return,
                Err(Errno::EINTR) => continue,
                Err(e) => fatal("unknown poll error on signal pipe", SupervisorError::Channel(e)),
            }
        }
    }

    fn request_stop(&self) -> Result<(), Errno> {
        self.stopping.store(true, Ordering::SeqCst);
        write_signal_byte(self.stop_write.as_raw_fd(), SignalNumber::from(SHUTDOWN_SENTINEL))
    }

    fn run(&self) {
        debug!("Signal bridge worker started");
        loop {
            self.wait();
            // Read the flag before draining so the last drain covers every
            // byte queued before the stop request
            let stopping = self.stopping.load(Ordering::SeqCst);
            self.drain();
            if stopping {
                break;
            }
        }
        debug!("Signal bridge worker exiting");
    }
}

/// Self-pipe bridge from OS signals to a handler on a dedicated thread
///
/// # Example
///
/// ```no_run
/// use proc_supervisor::signals::SignalBridge;
/// use proc_supervisor::Signal;
///
/// let mut bridge = SignalBridge::new()?;
/// // Configure the handler first to avoid races
/// bridge.set_handler(|signo| {
///     if signo == Signal::SIGTERM as i32 {
///         // heavy work: flush logs, finish transactions, ...
///     }
/// });
/// bridge.add_signal(Signal::SIGTERM)?;
/// bridge.add_signal(Signal::SIGINT)?;
/// # Ok::<(), proc_supervisor::SupervisorError>(())
/// ```
pub struct SignalBridge {
    id: u64,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    registered: BTreeSet<SignalNumber>,
}

impl SignalBridge {
    /// Create the data and shutdown pipes and start the worker thread
    pub fn new() -> SupervisorResult<Self> {
        let shared = Arc::new(Shared::new(PollTimeout::from(WORKER_POLL_TIMEOUT_MS))?);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("signal-bridge".into())
            .spawn(move || worker_shared.run())
            .map_err(SupervisorError::WorkerSpawn)?;

        let id = registry::next_bridge_id();
        info!(bridge = id, "Signal bridge started");

        Ok(Self {
            id,
            shared,
            worker: Some(worker),
            registered: BTreeSet::new(),
        })
    }

    /// Replace the handler invoked for each drained signal
    ///
    /// Configure once, before registering any signal.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(SignalNumber) + Send + Sync + 'static,
    {
        *self.shared.handler.write() = Some(Arc::new(handler));
    }

    /// Remove the handler; drained signals are then discarded
    pub fn clear_handler(&self) {
        *self.shared.handler.write() = None;
    }

    /// Send a signal number to the worker thread
    ///
    /// Async-signal-safe and errno-preserving. The value is truncated to one
    /// byte. Can also be used from the handler itself to requeue work.
    pub fn send_message(&self, signo: SignalNumber) -> Result<(), Errno> {
        write_signal_byte(self.shared.write_fd.as_raw_fd(), signo)
    }

    /// Route `signal` to this bridge and install the catcher
    ///
    /// Takes ownership from any other bridge that held it. Not thread-safe:
    /// serialize registration with other bridges.
    pub fn add_signal(&mut self, signal: Signal) -> SupervisorResult<()> {
        let signo = signal as SignalNumber;
        if let Some(previous) = registry::owner_of(signo).filter(|&owner| owner != self.id) {
            warn!(signal = %signal, previous_bridge = previous, bridge = self.id, "Taking over signal ownership");
        }

        registry::claim(signo, self.id, self.shared.write_fd.as_raw_fd())?;
        if let Err(e) = disposition::setup_signal_catcher(signal, registry::trampoline) {
            registry::release(signo, self.id);
            return Err(e);
        }

        self.registered.insert(signo);
        info!(signal = %signal, bridge = self.id, "Signal routed to bridge");
        Ok(())
    }

    /// Release one registration, restoring the default disposition
    ///
    /// Returns false if this bridge did not own the signal.
    pub fn release_signal(&mut self, signal: Signal) -> SupervisorResult<bool> {
        let signo = signal as SignalNumber;
        self.registered.remove(&signo);

        if registry::owner_of(signo) != Some(self.id) {
            return Ok(false);
        }
        disposition::reset_signal(signal)?;
        registry::release(signo, self.id);
        info!(signal = %signal, bridge = self.id, "Signal released");
        Ok(true)
    }

    /// Whether this bridge currently owns `signal`
    pub fn owns(&self, signal: Signal) -> bool {
        registry::owner_of(signal as SignalNumber) == Some(self.id)
    }

    /// Signals registered on this bridge, in numeric order
    pub fn signals(&self) -> Vec<Signal> {
        self.registered
            .iter()
            .filter_map(|&signo| Signal::try_from(signo).ok())
            .collect()
    }

    /// Install a plain catcher; SA_RESTART is enabled
    pub fn setup_signal_catcher(signal: Signal, catcher: CatcherFn) -> SupervisorResult<SigAction> {
        disposition::setup_signal_catcher(signal, catcher)
    }

    /// Install an extended siginfo-aware catcher; SA_RESTART is enabled
    pub fn setup_signal_action(signal: Signal, action: ActionFn) -> SupervisorResult<SigAction> {
        disposition::setup_signal_action(signal, action)
    }

    /// Restore the default disposition of `signal`
    pub fn reset_signal(signal: Signal) -> SupervisorResult<SigAction> {
        disposition::reset_signal(signal)
    }

    /// Query the installed disposition of `signal`
    pub fn query_disposition(signal: Signal) -> SupervisorResult<Disposition> {
        disposition::query_disposition(signal)
    }

    /// Whether the bridge trampoline is the installed catcher for `signal`
    pub fn is_bridged(signal: Signal) -> bool {
        disposition::query_disposition(signal)
            .map(|d| d.is_catcher(registry::trampoline))
            .unwrap_or(false)
    }

    fn stop_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if let Err(e) = self.shared.request_stop() {
            warn!(error = %e, "Could not wake signal bridge worker, waiting for poll timeout");
        }
        if worker.join().is_err() {
            warn!(bridge = self.id, "Signal bridge worker panicked");
        }
        self.clear_handler();
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.stop_worker();

        for signo in std::mem::take(&mut self.registered) {
            if registry::owner_of(signo) != Some(self.id) {
                continue;
            }
            if let Ok(signal) = Signal::try_from(signo) {
                if let Err(e) = disposition::reset_signal(signal) {
                    warn!(signal = signo, error = %e, "Failed to restore default disposition");
                }
            }
            registry::release(signo, self.id);
        }

        info!(bridge = self.id, "Signal bridge stopped");
        // Pipe ends close when `shared` drops
    }
}
