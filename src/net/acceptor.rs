use crate::net::endpoint::{Endpoint, Protocol};
use crate::net::error::{NetError, NetResult};
use crate::net::socket::{Socket, SocketOption};
use crate::net::sys;

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

/// A listening socket.
///
/// Used in the classic order `open` → `set_option` → `bind` → `listen`, after
/// which it can either block in [`accept`](Acceptor::accept) or be handed to a
/// [`StreamService`](crate::net::StreamService) for readiness-driven accepts.
#[derive(Debug, Default)]
pub struct Acceptor {
    fd: Option<RawFd>,
}

impl Acceptor {
    pub fn new() -> Self {
        Self { fd: None }
    }

    fn fd(&self) -> NetResult<RawFd> {
        self.fd.ok_or(NetError::Closed)
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Creates the OS handle. Reopening closes the previous one.
    pub fn open(&mut self, protocol: Protocol) -> NetResult<()> {
        let fd = sys::socket(protocol.family, protocol.socktype, protocol.protocol)
            .map_err(NetError::Open)?;
        self.close();
        self.fd = Some(fd);
        Ok(())
    }

    pub fn set_option(&mut self, option: SocketOption) -> NetResult<()> {
        option.apply(self.fd()?)
    }

    pub fn bind(&mut self, endpoint: &Endpoint) -> NetResult<()> {
        sys::bind(self.fd()?, &endpoint.address()).map_err(NetError::Bind)
    }

    /// Starts listening with room for `backlog` pending connections.
    ///
    /// The handle is switched to non-blocking so that a readiness-driven
    /// accept never stalls when the pending connection vanished meanwhile.
    pub fn listen(&mut self, backlog: i32) -> NetResult<()> {
        let fd = self.fd()?;
        sys::listen(fd, backlog).map_err(NetError::Listen)?;
        sys::set_nonblocking(fd, true).map_err(|source| NetError::SocketOption {
            option: "O_NONBLOCK",
            source,
        })
    }

    /// Accepts one connection. Returns `Ok(None)` when nothing is pending.
    pub fn accept(&mut self) -> NetResult<Option<Socket>> {
        match sys::accept(self.fd()?) {
            Ok((fd, peer)) => Ok(Some(Socket::from_raw(fd, Some(peer)))),
            Err(e) if sys::is_would_block(&e) => Ok(None),
            Err(e) if e.raw_os_error() == Some(libc::ECONNABORTED) => Ok(None),
            Err(e) => Err(NetError::Accept(e)),
        }
    }

    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        sys::local_addr(self.fd()?).map_err(|e| NetError::Platform(e.to_string()))
    }

    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            sys::close(fd);
        }
    }
}

impl AsRawFd for Acceptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.unwrap_or(-1)
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.close();
    }
}
