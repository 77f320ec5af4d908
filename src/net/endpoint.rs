use crate::net::error::{NetError, NetResult};
use crate::net::sys;

use libc::{AF_INET, SOCK_STREAM, addrinfo, c_int};
use std::ffi::{CStr, CString};
use std::net::SocketAddr;
use std::{mem, ptr};

/// The triple passed to `socket(2)` when opening a handle for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    pub family: c_int,
    pub socktype: c_int,
    pub protocol: c_int,
}

impl Protocol {
    pub fn tcp_v4() -> Self {
        Self {
            family: AF_INET,
            socktype: SOCK_STREAM,
            protocol: 0,
        }
    }
}

/// A resolved address/protocol pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    address: SocketAddr,
    protocol: Protocol,
}

impl Endpoint {
    /// Resolves `host` and `port` synchronously with `getaddrinfo`.
    ///
    /// `host` may be a domain name, a mnemonic such as `localhost`, or a
    /// literal IPv4 address; `port` may be numeric or a service name. Only
    /// IPv4 stream endpoints are considered and the first match wins.
    pub fn resolve(host: &str, port: &str) -> NetResult<Self> {
        let fail = |reason: String| NetError::Endpoint {
            host: host.to_string(),
            port: port.to_string(),
            reason,
        };

        let c_host = CString::new(host).map_err(|_| fail("host contains NUL".into()))?;
        let c_port = CString::new(port).map_err(|_| fail("port contains NUL".into()))?;

        let mut hints: addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = AF_INET;
        hints.ai_socktype = SOCK_STREAM;

        let mut list: *mut addrinfo = ptr::null_mut();
        let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), c_port.as_ptr(), &hints, &mut list) };
        if rc != 0 {
            let reason = unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }
                .to_string_lossy()
                .into_owned();
            return Err(fail(reason));
        }

        let resolved = AddrInfoList(list).first();
        resolved.ok_or_else(|| fail("no usable address".into()))
    }

    pub fn from_addr(address: SocketAddr) -> Self {
        let family = match address {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        Self {
            address,
            protocol: Protocol {
                family,
                socktype: SOCK_STREAM,
                protocol: 0,
            },
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

/// Frees the `getaddrinfo` list on drop.
struct AddrInfoList(*mut addrinfo);

impl AddrInfoList {
    fn first(&self) -> Option<Endpoint> {
        let mut cursor = self.0;
        while !cursor.is_null() {
            let info = unsafe { &*cursor };
            if !info.ai_addr.is_null() {
                let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
                let len = (info.ai_addrlen as usize).min(mem::size_of::<libc::sockaddr_storage>());
                unsafe {
                    ptr::copy_nonoverlapping(
                        info.ai_addr as *const u8,
                        &mut storage as *mut _ as *mut u8,
                        len,
                    );
                }
                if let Ok(address) = sys::sockaddr_storage_to_socketaddr(&storage) {
                    return Some(Endpoint {
                        address,
                        protocol: Protocol {
                            family: info.ai_family,
                            socktype: info.ai_socktype,
                            protocol: info.ai_protocol,
                        },
                    });
                }
            }
            cursor = info.ai_next;
        }
        None
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}
