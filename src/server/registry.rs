use std::collections::HashMap;

use tracing::{debug, warn};

use crate::http::connection::{Connection, ConnectionLimits, Progress};
use crate::http::response::StatusCode;
use crate::net::{ReadFailure, ServiceHandler, Socket, SocketOption, StreamService, Token};
use crate::server::strategy::{Exchange, HandlerStrategy};

/// Connections currently being read, keyed by their reactor token.
///
/// A connection leaves the registry exactly once: when it is dispatched,
/// rejected, closed by the peer, or timed out.
pub struct ConnectionRegistry<S> {
    connections: HashMap<Token, Connection>,
    strategy: S,
    buffer_size: usize,
    limits: ConnectionLimits,
}

impl<S: HandlerStrategy> ConnectionRegistry<S> {
    pub fn new(strategy: S, buffer_size: usize, limits: ConnectionLimits) -> Self {
        Self {
            connections: HashMap::new(),
            strategy,
            buffer_size,
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains_key(&token)
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    fn reject(&mut self, mut connection: Connection, status: StatusCode) {
        if let Err(e) = self.strategy.respond(connection.socket_mut(), status) {
            debug!(error = %e, "stock response not delivered");
        }
        connection.close();
    }
}

impl<S: HandlerStrategy> ServiceHandler for ConnectionRegistry<S> {
    fn accepted(&mut self, service: &mut StreamService, socket: Socket) {
        let peer = socket.peer_addr();

        if let Err(e) = socket.set_option(SocketOption::SendTimeout(service.idle_timeout())) {
            warn!(error = %e, "cannot set send timeout");
        }

        match service.add(&socket) {
            Ok(token) => {
                debug!(token = %token, peer = ?peer, "connection accepted");
                self.connections.insert(
                    token,
                    Connection::with_limits(socket, self.buffer_size, self.limits),
                );
                service.async_read(token);
            }
            Err(e) => warn!(peer = ?peer, error = %e, "cannot register connection"),
        }
    }

    fn readable(&mut self, service: &mut StreamService, token: Token) {
        let Some(connection) = self.connections.get_mut(&token) else {
            service.remove(token);
            return;
        };

        let progress = connection.on_readable();
        if progress == Progress::Continue {
            service.async_read(token);
            return;
        }

        service.remove(token);
        let Some(mut connection) = self.connections.remove(&token) else {
            return;
        };

        match progress {
            Progress::Dispatch => self.strategy.handle(Exchange::new(connection)),
            Progress::Reject(status) => {
                debug!(token = %token, status = status.as_u16(), "request rejected");
                self.reject(connection, status);
            }
            Progress::Close | Progress::Continue => {
                debug!(token = %token, "connection closed");
                connection.close();
            }
        }
    }

    fn read_failed(&mut self, _service: &mut StreamService, token: Token, failure: ReadFailure) {
        let Some(mut connection) = self.connections.remove(&token) else {
            return;
        };

        match failure {
            ReadFailure::TimedOut => {
                debug!(token = %token, "connection timed out");
                self.reject(connection, StatusCode::RequestTimeout);
            }
            ReadFailure::Cancelled => connection.close(),
        }
    }
}
