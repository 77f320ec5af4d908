//! The `select`-based stream service (reactor).
//!
//! One thread owns a [`StreamService`] and calls [`run`](StreamService::run)
//! (or [`turn`](StreamService::turn) repeatedly). Each turn waits for read
//! readiness on sockets with a read armed, every acceptor and the signal
//! channel, and for write readiness on sockets with a write armed. The wait
//! is bounded by the soonest idle deadline among armed reads. Readiness and
//! timeouts are reported to a [`ServiceHandler`] by [`Token`]; the service
//! never owns the sockets it watches.
//!
//! Idle time is measured on the wall clock from a socket's last activity, so
//! time spent inside callbacks counts against every other socket.

use crate::net::acceptor::Acceptor;
use crate::net::error::{NetError, NetResult};
use crate::net::signal::{self, SignalSet};
use crate::net::socket::Socket;
use crate::net::sys::{self, FdSet};

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Default per-socket idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque handle for a socket or acceptor registered with a [`StreamService`].
///
/// Tokens are never reused by the same service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(usize);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a pending read completed without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// The socket stayed silent for longer than its idle timeout.
    TimedOut,
    /// The service is shutting down after a signal.
    Cancelled,
}

/// Receives the events produced by a [`StreamService`] turn.
///
/// Every callback gets the service back so it can register, arm or remove
/// sockets; doing so in the middle of a turn is safe.
pub trait ServiceHandler {
    /// An acceptor produced a new connection.
    fn accepted(&mut self, service: &mut StreamService, socket: Socket);

    /// A socket with a pending read became readable. The pending read is
    /// consumed; the handler performs the read itself and re-arms with
    /// [`StreamService::async_read`] if it wants more.
    fn readable(&mut self, service: &mut StreamService, token: Token);

    /// A socket with a pending write can take more bytes. Like reads, the
    /// pending write is consumed and must be re-armed with
    /// [`StreamService::async_write`] if the handler still has data left.
    fn writable(&mut self, service: &mut StreamService, token: Token) {
        let _ = (service, token);
    }

    /// A pending read failed. The socket has already been removed from the
    /// service when this is called.
    fn read_failed(&mut self, service: &mut StreamService, token: Token, failure: ReadFailure);
}

#[derive(Debug)]
struct SocketService {
    fd: RawFd,
    timeout: Duration,
    last_activity: Instant,
    read_pending: bool,
    write_pending: bool,
}

impl SocketService {
    fn remaining(&self, now: Instant) -> Duration {
        self.timeout.saturating_sub(now.saturating_duration_since(self.last_activity))
    }
}

pub struct StreamService {
    sockets: BTreeMap<Token, SocketService>,
    acceptors: BTreeMap<Token, Acceptor>,
    signals: Option<SignalSet>,
    idle_timeout: Duration,
    next_token: usize,
}

impl Default for StreamService {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamService {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sockets: BTreeMap::new(),
            acceptors: BTreeMap::new(),
            signals: None,
            idle_timeout,
            next_token: 0,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn check_watchable(fd: RawFd) -> NetResult<()> {
        if !FdSet::accepts(fd) {
            return Err(NetError::Service(io::Error::other(format!(
                "descriptor {fd} cannot be watched by select"
            ))));
        }
        Ok(())
    }

    /// Registers `socket` with the service's idle timeout. Nothing is watched
    /// until a read or write is armed.
    pub fn add(&mut self, socket: &Socket) -> NetResult<Token> {
        let fd = socket.handle();
        Self::check_watchable(fd)?;

        let token = self.token();
        self.sockets.insert(
            token,
            SocketService {
                fd,
                timeout: self.idle_timeout,
                last_activity: Instant::now(),
                read_pending: false,
                write_pending: false,
            },
        );
        Ok(token)
    }

    /// Stops watching a socket. Returns `false` if it was not registered.
    pub fn remove(&mut self, token: Token) -> bool {
        self.sockets.remove(&token).is_some()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.sockets.contains_key(&token)
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Queues one read on a registered socket and restarts its idle clock.
    ///
    /// At most one read is pending per socket; arming twice is the same as
    /// arming once. Returns `false` for an unknown token.
    pub fn async_read(&mut self, token: Token) -> bool {
        match self.sockets.get_mut(&token) {
            Some(entry) => {
                entry.read_pending = true;
                entry.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Queues one write-readiness notification on a registered socket.
    ///
    /// Pending writes have no idle timeout. Returns `false` for an unknown
    /// token.
    pub fn async_write(&mut self, token: Token) -> bool {
        match self.sockets.get_mut(&token) {
            Some(entry) => {
                entry.write_pending = true;
                true
            }
            None => false,
        }
    }

    pub fn set_timeout(&mut self, token: Token, timeout: Duration) -> bool {
        match self.sockets.get_mut(&token) {
            Some(entry) => {
                entry.timeout = timeout;
                true
            }
            None => false,
        }
    }

    /// Time left before the socket's pending read times out.
    pub fn remaining(&self, token: Token) -> Option<Duration> {
        let now = Instant::now();
        self.sockets.get(&token).map(|s| s.remaining(now))
    }

    /// Hands a listening acceptor to the service. From now on every
    /// readiness event performs one accept and reports it through
    /// [`ServiceHandler::accepted`].
    pub fn add_acceptor(&mut self, acceptor: Acceptor) -> NetResult<Token> {
        if !acceptor.is_open() {
            return Err(NetError::Closed);
        }
        Self::check_watchable(acceptor.as_raw_fd())?;

        let token = self.token();
        self.acceptors.insert(token, acceptor);
        Ok(token)
    }

    pub fn acceptor(&self, token: Token) -> Option<&Acceptor> {
        self.acceptors.get(&token)
    }

    /// Installs the signal channel. Only one set is kept; a second call
    /// replaces the first.
    pub fn add_signals(&mut self, signals: SignalSet) -> NetResult<()> {
        Self::check_watchable(signals.channel())?;
        self.signals = Some(signals);
        Ok(())
    }

    fn pending_signal(&self) -> Option<i32> {
        self.signals.as_ref().and_then(|_| signal::caught())
    }

    /// Builds this turn's read and write sets. Returns the highest
    /// descriptor in either, or `-1` when both are empty.
    fn interest(&self) -> (FdSet, FdSet, RawFd) {
        let mut read = FdSet::new();
        let mut write = FdSet::new();
        let mut max_fd = -1;

        for entry in self.sockets.values() {
            if entry.read_pending {
                read.insert(entry.fd);
                max_fd = max_fd.max(entry.fd);
            }
            if entry.write_pending {
                write.insert(entry.fd);
                max_fd = max_fd.max(entry.fd);
            }
        }

        let acceptors = self.acceptors.values().map(AsRawFd::as_raw_fd);
        let signals = self.signals.iter().map(SignalSet::channel);
        for fd in acceptors.chain(signals) {
            read.insert(fd);
            max_fd = max_fd.max(fd);
        }

        (read, write, max_fd)
    }

    /// Soonest idle deadline among sockets with a pending read.
    fn deadline(&self, now: Instant) -> Option<Duration> {
        self.sockets
            .values()
            .filter(|s| s.read_pending)
            .map(|s| s.remaining(now))
            .min()
    }

    /// Runs until a registered signal arrives and returns its number, or
    /// returns `0` once nothing is left to watch.
    pub fn run<H: ServiceHandler>(&mut self, handler: &mut H) -> NetResult<i32> {
        loop {
            if let Some(code) = self.turn(handler)? {
                return Ok(code);
            }
        }
    }

    /// Performs one readiness wait and dispatches what it found.
    ///
    /// Returns `Some(code)` when the service stopped: the signal number after
    /// a signal, or `0` when nothing is armed or listening.
    pub fn turn<H: ServiceHandler>(&mut self, handler: &mut H) -> NetResult<Option<i32>> {
        if let Some(signum) = self.pending_signal() {
            return Ok(Some(self.drain(handler, signum)));
        }

        let (mut readable, mut writable, max_fd) = self.interest();
        if max_fd < 0 {
            return Ok(Some(0));
        }

        let deadline = self.deadline(Instant::now());
        if let Err(e) = sys::select(max_fd, &mut readable, &mut writable, deadline) {
            if let Some(signum) = self.pending_signal() {
                return Ok(Some(self.drain(handler, signum)));
            }
            if e.kind() != io::ErrorKind::Interrupted {
                return Err(NetError::Service(e));
            }
            readable = FdSet::new();
            writable = FdSet::new();
        }

        if let Some(signum) = self.pending_signal() {
            return Ok(Some(self.drain(handler, signum)));
        }

        self.dispatch_sockets(&readable, &writable, handler);
        self.dispatch_acceptors(&readable, handler);
        Ok(None)
    }

    fn dispatch_sockets<H: ServiceHandler>(
        &mut self,
        readable: &FdSet,
        writable: &FdSet,
        handler: &mut H,
    ) {
        // Handlers may remove sockets, so iterate over a snapshot.
        let tokens: Vec<Token> = self.sockets.keys().copied().collect();

        for token in tokens {
            if let Some(entry) = self.sockets.get_mut(&token) {
                if entry.write_pending && writable.contains(entry.fd) {
                    entry.write_pending = false;
                    handler.writable(self, token);
                }
            }

            let Some(entry) = self.sockets.get_mut(&token) else {
                continue;
            };
            if !entry.read_pending {
                continue;
            }

            // Sampled per socket so earlier callbacks count as idle time.
            let now = Instant::now();
            if readable.contains(entry.fd) {
                entry.read_pending = false;
                entry.last_activity = now;
                handler.readable(self, token);
            } else if entry.remaining(now).is_zero() {
                tracing::debug!(token = %token, "socket idle timeout");
                self.remove(token);
                handler.read_failed(self, token, ReadFailure::TimedOut);
            }
        }
    }

    fn dispatch_acceptors<H: ServiceHandler>(&mut self, ready: &FdSet, handler: &mut H) {
        let tokens: Vec<Token> = self
            .acceptors
            .iter()
            .filter(|(_, acceptor)| ready.contains(acceptor.as_raw_fd()))
            .map(|(token, _)| *token)
            .collect();

        for token in tokens {
            let accepted = match self.acceptors.get_mut(&token) {
                Some(acceptor) => acceptor.accept(),
                None => continue,
            };

            match accepted {
                Ok(Some(socket)) => handler.accepted(self, socket),
                Ok(None) => {}
                Err(e) => tracing::warn!(acceptor = %token, error = %e, "accept failed"),
            }
        }
    }

    /// Cancels every pending read and forgets every socket.
    fn drain<H: ServiceHandler>(&mut self, handler: &mut H, signum: i32) -> i32 {
        let tokens: Vec<Token> = self.sockets.keys().copied().collect();
        for &token in &tokens {
            self.remove(token);
            handler.read_failed(self, token, ReadFailure::Cancelled);
        }

        tracing::info!(signal = signum, drained = tokens.len(), "stream service stopping");
        signum
    }
}
