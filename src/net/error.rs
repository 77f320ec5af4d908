//! Error types for the socket and reactor layer.

use std::io;

/// Failures raised by sockets, acceptors, endpoints and the stream service.
///
/// Would-block conditions are never reported through this type; the
/// non-blocking primitives return `None` instead.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Platform initialisation or an unsupported platform feature.
    #[error("platform error: {0}")]
    Platform(String),

    /// `setsockopt` or `fcntl` failed.
    #[error("failed to set socket option {option}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    /// Creating a socket failed.
    #[error("failed to open socket")]
    Open(#[source] io::Error),

    #[error("bind failed")]
    Bind(#[source] io::Error),

    #[error("listen failed")]
    Listen(#[source] io::Error),

    #[error("accept failed")]
    Accept(#[source] io::Error),

    #[error("send failed")]
    Send(#[source] io::Error),

    #[error("recv failed")]
    Receive(#[source] io::Error),

    /// Name or service resolution failed.
    #[error("endpoint resolution failed for {host}:{port}: {reason}")]
    Endpoint {
        host: String,
        port: String,
        reason: String,
    },

    /// The readiness wait or the watch-set bookkeeping failed.
    #[error("stream service failure: {0}")]
    Service(#[source] io::Error),

    /// The operation needs an open handle but the socket was already closed.
    #[error("socket is closed")]
    Closed,
}

impl NetError {
    /// Returns `true` for failures raised while moving bytes on an open socket.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, NetError::Send(_) | NetError::Receive(_))
    }
}

pub type NetResult<T> = Result<T, NetError>;
