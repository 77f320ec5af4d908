//! Thin wrappers over the BSD socket calls used by the rest of `net`.
//!
//! Every function returns `io::Result` built from `errno`; callers map the
//! error into the matching [`NetError`](super::NetError) variant.

use libc::{
    AF_INET, AF_INET6, AF_UNIX, F_GETFL, F_SETFD, F_SETFL, FD_CLOEXEC, O_NONBLOCK, SHUT_RD,
    SHUT_RDWR, SHUT_WR, SOCK_STREAM, c_int, c_void, sockaddr, sockaddr_in, sockaddr_in6,
    sockaddr_storage, socklen_t,
};
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::time::Duration;
use std::{io, mem, ptr};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

fn check(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// `true` when `err` only means "try again later".
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Creates a socket with `FD_CLOEXEC` set.
pub(crate) fn socket(family: c_int, socktype: c_int, protocol: c_int) -> io::Result<RawFd> {
    let fd = check(unsafe { libc::socket(family, socktype, protocol) })?;
    if let Err(e) = set_cloexec(fd) {
        close(fd);
        return Err(e);
    }
    prepare_stream(fd);
    Ok(fd)
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    check(unsafe { libc::fcntl(fd, F_SETFD, FD_CLOEXEC) }).map(drop)
}

/// Suppresses `SIGPIPE` on platforms that have no `MSG_NOSIGNAL`.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn prepare_stream(fd: RawFd) {
    let _ = set_option_int(fd, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1);
}

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
fn prepare_stream(_fd: RawFd) {}

pub(crate) fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = check(unsafe { libc::fcntl(fd, F_GETFL) })?;
    let flags = if nonblocking {
        flags | O_NONBLOCK
    } else {
        flags & !O_NONBLOCK
    };
    check(unsafe { libc::fcntl(fd, F_SETFL, flags) }).map(drop)
}

pub(crate) fn set_option_int(fd: RawFd, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const c_int as *const c_void,
            mem::size_of::<c_int>() as socklen_t,
        )
    };
    check(rc).map(drop)
}

pub(crate) fn set_option_timeout(
    fd: RawFd,
    level: c_int,
    name: c_int,
    timeout: Duration,
) -> io::Result<()> {
    let value = timeval(timeout);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const libc::timeval as *const c_void,
            mem::size_of::<libc::timeval>() as socklen_t,
        )
    };
    check(rc).map(drop)
}

pub(crate) fn timeval(duration: Duration) -> libc::timeval {
    libc::timeval {
        tv_sec: duration.as_secs() as _,
        tv_usec: duration.subsec_micros() as _,
    }
}

pub(crate) fn bind(fd: RawFd, addr: &SocketAddr) -> io::Result<()> {
    let (storage, len) = socketaddr_to_storage(addr);
    let rc = unsafe { libc::bind(fd, &storage as *const _ as *const sockaddr, len) };
    check(rc).map(drop)
}

pub(crate) fn listen(fd: RawFd, backlog: c_int) -> io::Result<()> {
    check(unsafe { libc::listen(fd, backlog) }).map(drop)
}

/// Accepts one pending connection. The new descriptor is blocking and
/// close-on-exec regardless of the listener's flags.
pub(crate) fn accept(fd: RawFd) -> io::Result<(RawFd, SocketAddr)> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let client = check(unsafe {
        libc::accept(fd, &mut storage as *mut _ as *mut sockaddr, &mut len)
    })?;

    let prepared = set_cloexec(client)
        .and_then(|_| set_nonblocking(client, false))
        .and_then(|_| sockaddr_storage_to_socketaddr(&storage));

    match prepared {
        Ok(addr) => {
            prepare_stream(client);
            Ok((client, addr))
        }
        Err(e) => {
            close(client);
            Err(e)
        }
    }
}

pub(crate) fn recv(fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::recv(fd, buffer.as_mut_ptr() as *mut c_void, buffer.len(), 0) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

pub(crate) fn send(fd: RawFd, buffer: &[u8]) -> io::Result<usize> {
    send_with(fd, buffer, SEND_FLAGS)
}

/// Single `send` that fails with `WouldBlock` instead of waiting for room.
pub(crate) fn send_nowait(fd: RawFd, buffer: &[u8]) -> io::Result<usize> {
    send_with(fd, buffer, SEND_FLAGS | libc::MSG_DONTWAIT)
}

fn send_with(fd: RawFd, buffer: &[u8], flags: c_int) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::send(fd, buffer.as_ptr() as *const c_void, buffer.len(), flags) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

pub(crate) fn shutdown(fd: RawFd, how: Shutdown) -> io::Result<()> {
    let how = match how {
        Shutdown::Read => SHUT_RD,
        Shutdown::Write => SHUT_WR,
        Shutdown::Both => SHUT_RDWR,
    };
    check(unsafe { libc::shutdown(fd, how) }).map(drop)
}

pub(crate) fn close(fd: RawFd) {
    unsafe { libc::close(fd) };
}

pub(crate) fn local_addr(fd: RawFd) -> io::Result<SocketAddr> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;
    check(unsafe { libc::getsockname(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) })?;
    sockaddr_storage_to_socketaddr(&storage)
}

/// A connected pair of local stream sockets, both blocking.
pub(crate) fn socketpair() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as c_int; 2];
    check(unsafe { libc::socketpair(AF_UNIX, SOCK_STREAM, 0, fds.as_mut_ptr()) })?;
    for fd in fds {
        if let Err(e) = set_cloexec(fd) {
            close(fds[0]);
            close(fds[1]);
            return Err(e);
        }
        prepare_stream(fd);
    }
    Ok((fds[0], fds[1]))
}

/// A non-blocking, close-on-exec pipe as `(read, write)`.
pub(crate) fn pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as c_int; 2];
    check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    for fd in fds {
        let prepared = set_cloexec(fd).and_then(|_| set_nonblocking(fd, true));
        if let Err(e) = prepared {
            close(fds[0]);
            close(fds[1]);
            return Err(e);
        }
    }
    Ok((fds[0], fds[1]))
}

pub(crate) fn sockaddr_storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        AF_INET => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let port = u16::from_be(addr.sin_port);

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }

        AF_INET6 => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(addr.sin6_addr.s6_addr);
            let port = u16::from_be(addr.sin6_port);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                addr.sin6_flowinfo,
                addr.sin6_scope_id,
            )))
        }

        // Unix-domain peers (socketpair) carry no inet address.
        AF_UNIX => Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))),

        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported address family",
        )),
    }
}

pub(crate) fn socketaddr_to_storage(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    match addr {
        SocketAddr::V4(v4) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sa.sin_family = AF_INET as _;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            (storage, mem::size_of::<sockaddr_in>() as socklen_t)
        }

        SocketAddr::V6(v6) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sa.sin6_family = AF_INET6 as _;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr.s6_addr = v6.ip().octets();
            sa.sin6_flowinfo = v6.flowinfo();
            sa.sin6_scope_id = v6.scope_id();

            (storage, mem::size_of::<sockaddr_in6>() as socklen_t)
        }
    }
}

/// Safe owner of a `select(2)` descriptor set.
#[derive(Clone)]
pub(crate) struct FdSet {
    raw: libc::fd_set,
}

impl FdSet {
    pub(crate) fn new() -> Self {
        let mut raw: libc::fd_set = unsafe { mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut raw) };
        Self { raw }
    }

    /// `select` cannot watch descriptors at or above `FD_SETSIZE`.
    pub(crate) fn accepts(fd: RawFd) -> bool {
        fd >= 0 && (fd as usize) < libc::FD_SETSIZE as usize
    }

    pub(crate) fn insert(&mut self, fd: RawFd) {
        debug_assert!(Self::accepts(fd));
        unsafe { libc::FD_SET(fd, &mut self.raw) };
    }

    pub(crate) fn remove(&mut self, fd: RawFd) {
        if Self::accepts(fd) {
            unsafe { libc::FD_CLR(fd, &mut self.raw) };
        }
    }

    pub(crate) fn contains(&self, fd: RawFd) -> bool {
        Self::accepts(fd) && unsafe { libc::FD_ISSET(fd, &self.raw) }
    }
}

/// Waits for read readiness on `read` and write readiness on `write`.
/// `None` blocks without a deadline. On success both sets hold only the
/// ready descriptors.
pub(crate) fn select(
    max_fd: RawFd,
    read: &mut FdSet,
    write: &mut FdSet,
    timeout: Option<Duration>,
) -> io::Result<usize> {
    let mut tv = timeout.map(timeval);
    let tv_ptr = match tv.as_mut() {
        Some(tv) => tv as *mut libc::timeval,
        None => ptr::null_mut(),
    };

    let n = check(unsafe {
        libc::select(max_fd + 1, &mut read.raw, &mut write.raw, ptr::null_mut(), tv_ptr)
    })?;
    Ok(n as usize)
}
