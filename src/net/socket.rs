use crate::net::error::{NetError, NetResult};
use crate::net::sys;

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::time::Duration;

/// Socket options understood by [`Socket::set_option`] and
/// [`Acceptor::set_option`](crate::net::Acceptor::set_option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// `SO_REUSEADDR`. Must be set before `bind`.
    ReuseAddress(bool),
    /// `SO_SNDTIMEO`; a blocked send fails after this long.
    SendTimeout(Duration),
    /// `SO_RCVTIMEO`; a blocked receive reports would-block after this long.
    ReceiveTimeout(Duration),
}

impl SocketOption {
    pub fn name(&self) -> &'static str {
        match self {
            SocketOption::ReuseAddress(_) => "SO_REUSEADDR",
            SocketOption::SendTimeout(_) => "SO_SNDTIMEO",
            SocketOption::ReceiveTimeout(_) => "SO_RCVTIMEO",
        }
    }

    pub(crate) fn apply(&self, fd: RawFd) -> NetResult<()> {
        let result = match *self {
            SocketOption::ReuseAddress(on) => {
                sys::set_option_int(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, on as libc::c_int)
            }
            SocketOption::SendTimeout(t) => {
                sys::set_option_timeout(fd, libc::SOL_SOCKET, libc::SO_SNDTIMEO, t)
            }
            SocketOption::ReceiveTimeout(t) => {
                sys::set_option_timeout(fd, libc::SOL_SOCKET, libc::SO_RCVTIMEO, t)
            }
        };

        result.map_err(|source| NetError::SocketOption {
            option: self.name(),
            source,
        })
    }
}

/// A connected stream socket that exclusively owns its descriptor.
///
/// The descriptor is released exactly once: by [`close`](Socket::close) or on
/// drop, whichever comes first. Closing twice is a no-op.
#[derive(Debug)]
pub struct Socket {
    fd: RawFd,
    closed: bool,
    peer: Option<SocketAddr>,
}

impl Socket {
    pub(crate) fn from_raw(fd: RawFd, peer: Option<SocketAddr>) -> Self {
        Self {
            fd,
            closed: false,
            peer,
        }
    }

    /// Creates a connected pair of local sockets.
    pub fn pair() -> NetResult<(Socket, Socket)> {
        let (a, b) = sys::socketpair().map_err(NetError::Open)?;
        Ok((Socket::from_raw(a, None), Socket::from_raw(b, None)))
    }

    pub fn handle(&self) -> RawFd {
        self.fd
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn open_fd(&self) -> NetResult<RawFd> {
        if self.closed {
            Err(NetError::Closed)
        } else {
            Ok(self.fd)
        }
    }

    pub fn set_option(&self, option: SocketOption) -> NetResult<()> {
        option.apply(self.open_fd()?)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> NetResult<()> {
        sys::set_nonblocking(self.open_fd()?, nonblocking).map_err(|source| {
            NetError::SocketOption {
                option: "O_NONBLOCK",
                source,
            }
        })
    }

    /// Blocks until `buffer` is full or the peer closes.
    ///
    /// Returns the number of bytes read, which is short only on end of stream.
    pub fn read(&mut self, buffer: &mut [u8]) -> NetResult<usize> {
        let fd = self.open_fd()?;
        let mut total = 0;
        while total < buffer.len() {
            match sys::recv(fd, &mut buffer[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => return Err(NetError::Receive(e)),
            }
        }
        Ok(total)
    }

    /// Performs a single `recv`.
    ///
    /// `Ok(Some(0))` is end of stream, `Ok(None)` means the call would have
    /// blocked (or the receive timeout elapsed). Anything else is an error.
    pub fn read_some(&mut self, buffer: &mut [u8]) -> NetResult<Option<usize>> {
        let fd = self.open_fd()?;
        match sys::recv(fd, buffer) {
            Ok(n) => Ok(Some(n)),
            Err(e) if sys::is_would_block(&e) => Ok(None),
            Err(e) => Err(NetError::Receive(e)),
        }
    }

    /// Blocks until the whole buffer has been sent.
    pub fn write(&mut self, buffer: &[u8]) -> NetResult<usize> {
        let mut total = 0;
        while total < buffer.len() {
            total += self.write_some(&buffer[total..])?;
        }
        Ok(total)
    }

    /// Performs a single `send`.
    pub fn write_some(&mut self, buffer: &[u8]) -> NetResult<usize> {
        let fd = self.open_fd()?;
        match sys::send(fd, buffer) {
            Ok(0) if !buffer.is_empty() => Err(NetError::Send(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed while writing",
            ))),
            Ok(n) => Ok(n),
            Err(e) => Err(NetError::Send(e)),
        }
    }

    /// Performs a single `send` that never waits for buffer space.
    ///
    /// `Ok(None)` means the socket could not take any bytes right now; arm
    /// [`StreamService::async_write`](crate::net::StreamService::async_write)
    /// and retry from [`ServiceHandler::writable`](crate::net::ServiceHandler::writable).
    pub fn try_write(&mut self, buffer: &[u8]) -> NetResult<Option<usize>> {
        let fd = self.open_fd()?;
        match sys::send_nowait(fd, buffer) {
            Ok(0) if !buffer.is_empty() => Err(NetError::Send(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed while writing",
            ))),
            Ok(n) => Ok(Some(n)),
            Err(e) if sys::is_would_block(&e) => Ok(None),
            Err(e) => Err(NetError::Send(e)),
        }
    }

    /// Shuts down one or both directions. A peer that already went away is
    /// not an error.
    pub fn shutdown(&mut self, how: Shutdown) -> NetResult<()> {
        let fd = self.open_fd()?;
        match sys::shutdown(fd, how) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => Ok(()),
            Err(e) => Err(NetError::Send(e)),
        }
    }

    /// Releases the descriptor. Subsequent calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            sys::close(self.fd);
        }
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Socket::from_raw(stream.into_raw_fd(), peer)
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}
