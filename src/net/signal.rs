//! Process-wide signal channel.
//!
//! OS signal handlers cannot capture context, so delivery is recorded in
//! global state: the signal number, a "received" flag, and one byte written
//! to a self-pipe. The read end of that pipe is what the
//! [`StreamService`](crate::net::StreamService) watches, which makes signal
//! delivery just another readiness event. The reactor is the only reader.
//!
//! The state is never reset: once a handled signal arrives, every reactor in
//! the process shuts down.

use crate::net::error::{NetError, NetResult};
use crate::net::sys;

use libc::c_int;
use std::os::fd::RawFd;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static RECEIVED: AtomicBool = AtomicBool::new(false);
static SIGNAL: AtomicI32 = AtomicI32::new(0);
static PIPE_READ: AtomicI32 = AtomicI32::new(-1);
static PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);
static PIPE_INIT: Mutex<()> = Mutex::new(());

extern "C" fn on_signal(signum: c_int) {
    SIGNAL.store(signum, Ordering::SeqCst);
    RECEIVED.store(true, Ordering::SeqCst);

    let fd = PIPE_WRITE.load(Ordering::SeqCst);
    if fd >= 0 {
        let byte = 1u8;
        unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
    }
}

fn channel() -> NetResult<RawFd> {
    let _guard = PIPE_INIT
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let existing = PIPE_READ.load(Ordering::SeqCst);
    if existing >= 0 {
        return Ok(existing);
    }

    let (read, write) = sys::pipe().map_err(|e| NetError::Platform(format!("signal pipe: {e}")))?;
    PIPE_WRITE.store(write, Ordering::SeqCst);
    PIPE_READ.store(read, Ordering::SeqCst);
    Ok(read)
}

/// Whether a handled signal has been delivered to the process.
pub fn received() -> bool {
    RECEIVED.load(Ordering::SeqCst)
}

/// The number of the last delivered signal, if any.
pub fn caught() -> Option<i32> {
    received().then(|| SIGNAL.load(Ordering::SeqCst))
}

/// Registers signals whose delivery stops the reactor.
///
/// Handlers are installed once per signal number and stay installed for the
/// rest of the process.
#[derive(Debug)]
pub struct SignalSet {
    channel: RawFd,
    signals: Vec<c_int>,
}

impl SignalSet {
    pub fn new() -> NetResult<Self> {
        Ok(Self {
            channel: channel()?,
            signals: Vec::new(),
        })
    }

    /// `SIGINT`, `SIGTERM` and `SIGQUIT`.
    pub fn termination() -> NetResult<Self> {
        let mut set = Self::new()?;
        set.add(libc::SIGINT)?;
        set.add(libc::SIGTERM)?;
        set.add(libc::SIGQUIT)?;
        Ok(set)
    }

    pub fn add(&mut self, signum: c_int) -> NetResult<()> {
        if self.signals.contains(&signum) {
            return Ok(());
        }

        let previous = unsafe { libc::signal(signum, on_signal as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(NetError::Platform(format!(
                "cannot install handler for signal {signum}: {}",
                std::io::Error::last_os_error()
            )));
        }

        self.signals.push(signum);
        Ok(())
    }

    pub fn signals(&self) -> &[c_int] {
        &self.signals
    }

    /// The descriptor that becomes readable when a signal arrives.
    pub(crate) fn channel(&self) -> RawFd {
        self.channel
    }
}
