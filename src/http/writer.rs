use bytes::{BufMut, Bytes, BytesMut};

use crate::http::response::Response;
use crate::net::{NetResult, Socket};

pub(crate) fn serialize_response(resp: &Response) -> Bytes {
    let header_len: usize = resp
        .headers
        .iter()
        .map(|h| h.name.len() + h.value.len() + 4)
        .sum();
    let mut buf = BytesMut::with_capacity(64 + header_len + resp.body.len());

    // Status line
    buf.put_slice(resp.status.status_line().as_bytes());

    for header in &resp.headers {
        buf.put_slice(header.name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(header.value.as_bytes());
        buf.put_slice(b"\r\n");
    }

    // Header/body separator
    buf.put_slice(b"\r\n");

    buf.put_slice(&resp.body);

    buf.freeze()
}

/// Serialized response plus a cursor, so a partially failed send can be
/// resumed.
pub struct ResponseWriter {
    buffer: Bytes,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    /// Sends everything that is left, blocking on the socket.
    pub fn write_to(&mut self, socket: &mut Socket) -> NetResult<()> {
        while self.written < self.buffer.len() {
            self.written += socket.write_some(&self.buffer[self.written..])?;
        }
        Ok(())
    }
}
