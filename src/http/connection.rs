use std::net::Shutdown;

use crate::http::parser::{ParseResult, RequestParser};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::net::{NetResult, Socket};

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Upper bounds applied while a request is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Bytes allowed for the request line plus headers. Exceeding it is a 400.
    pub max_header_bytes: usize,
    /// Largest accepted `Content-Length`. Exceeding it is a 413.
    pub max_body_bytes: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Reading,
    ReadingBody,
    Dispatching,
    Writing,
    Closed,
}

/// What the owner of a connection has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More bytes are needed: arm another read.
    Continue,
    /// The request is complete and must be handed to the handler.
    Dispatch,
    /// The request is unacceptable: answer with this stock status and close.
    Reject(StatusCode),
    /// The peer went away or the read failed: close without answering.
    Close,
}

/// A single client connection.
///
/// Reads are driven from outside (by the reactor) through
/// [`on_readable`](Connection::on_readable); each call performs one
/// non-blocking receive into a fixed buffer and runs the bytes through the
/// parser. Once the request is dispatched the connection is answered with
/// [`respond`](Connection::respond) and torn down with
/// [`close`](Connection::close).
pub struct Connection {
    socket: Socket,
    buffer: Vec<u8>,
    parser: RequestParser,
    request: Request,
    state: ConnectionState,
    limits: ConnectionLimits,
    header_bytes: usize,
}

impl Connection {
    pub fn new(socket: Socket) -> Self {
        Self::with_limits(socket, DEFAULT_BUFFER_SIZE, ConnectionLimits::default())
    }

    pub fn with_limits(socket: Socket, buffer_size: usize, limits: ConnectionLimits) -> Self {
        Self {
            socket,
            buffer: vec![0; buffer_size.max(1)],
            parser: RequestParser::new(),
            request: Request::default(),
            state: ConnectionState::Reading,
            limits,
            header_bytes: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }

    /// Performs one receive and feeds what arrived to the parser.
    pub fn on_readable(&mut self) -> Progress {
        if !matches!(self.state, ConnectionState::Reading | ConnectionState::ReadingBody) {
            return Progress::Close;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        let progress = match self.socket.read_some(&mut buffer) {
            Ok(Some(0)) => Progress::Close,
            Ok(Some(n)) => self.advance(&buffer[..n]),
            Ok(None) => Progress::Continue,
            Err(e) => {
                tracing::debug!(error = %e, "connection read failed");
                Progress::Close
            }
        };
        self.buffer = buffer;

        if progress == Progress::Close {
            self.state = ConnectionState::Closed;
        }
        progress
    }

    /// Runs received bytes through the header parser or body accumulator.
    pub fn advance(&mut self, data: &[u8]) -> Progress {
        match self.state {
            ConnectionState::Reading => self.advance_headers(data),
            ConnectionState::ReadingBody => self.advance_body(data),
            _ => Progress::Close,
        }
    }

    fn advance_headers(&mut self, data: &[u8]) -> Progress {
        let (result, consumed) = self.parser.parse(data, &mut self.request);
        self.header_bytes += consumed;

        match result {
            ParseResult::Bad => Progress::Reject(StatusCode::BadRequest),
            ParseResult::Indeterminate if self.header_bytes > self.limits.max_header_bytes => {
                Progress::Reject(StatusCode::BadRequest)
            }
            ParseResult::Indeterminate => Progress::Continue,
            ParseResult::Good => {
                if self.request.content_length() > self.limits.max_body_bytes {
                    return Progress::Reject(StatusCode::PayloadTooLarge);
                }
                self.state = ConnectionState::ReadingBody;
                self.advance_body(&data[consumed..])
            }
        }
    }

    fn advance_body(&mut self, data: &[u8]) -> Progress {
        if self.parser.fill(data, &mut self.request) {
            self.state = ConnectionState::Dispatching;
            Progress::Dispatch
        } else {
            Progress::Continue
        }
    }

    /// Writes `response` to the peer, blocking until it is sent.
    pub fn respond(&mut self, response: &Response) -> NetResult<()> {
        self.state = ConnectionState::Writing;
        ResponseWriter::new(response).write_to(&mut self.socket)
    }

    /// Shuts the socket down in both directions and releases it.
    pub fn close(&mut self) {
        if !self.socket.is_closed() {
            if let Err(e) = self.socket.shutdown(Shutdown::Both) {
                tracing::debug!(error = %e, "shutdown failed");
            }
            self.socket.close();
        }
        self.state = ConnectionState::Closed;
    }
}
