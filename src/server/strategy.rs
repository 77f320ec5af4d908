//! How completed requests are turned into responses.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::http::connection::Connection;
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::net::{NetResult, Socket};
use crate::pool::{Admission, PoolError, ThreadPool};

/// The user callback producing one response per request.
pub type RequestHandler = Arc<dyn Fn(&Request) -> anyhow::Result<Response> + Send + Sync>;

/// A fully read request together with the connection it must be answered on.
///
/// Whoever holds the exchange is the only writer of that connection.
pub struct Exchange {
    connection: Connection,
}

impl Exchange {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn request(&self) -> &Request {
        self.connection.request()
    }

    /// Runs `handler`, writes its response and closes the connection.
    ///
    /// A handler error or panic is answered with a stock 500.
    pub fn complete(self, handler: &RequestHandler) {
        let response = invoke(handler, self.connection.request());
        self.reply(&response);
    }

    /// Writes `response` and closes the connection.
    pub fn reply(mut self, response: &Response) {
        match self.connection.respond(response) {
            Ok(()) => {}
            Err(e) if e.is_stream_error() => debug!(error = %e, "response not delivered"),
            Err(e) => warn!(error = %e, "response not delivered"),
        }
        self.connection.close();
    }
}

fn invoke(handler: &RequestHandler, request: &Request) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let reason = format!("{e:#}");
            error!(
                method = request.method(),
                uri = %request.uri(),
                error = %reason,
                "request handler failed"
            );
            Response::stock(StatusCode::InternalServerError)
        }
        Err(_) => {
            error!(
                method = request.method(),
                uri = %request.uri(),
                "request handler panicked"
            );
            Response::stock(StatusCode::InternalServerError)
        }
    }
}

/// Decides where a request handler runs.
pub trait HandlerStrategy {
    /// Takes ownership of a completed request. Called once per connection.
    fn handle(&mut self, exchange: Exchange);

    /// Writes a stock response straight to `socket`, bypassing the handler.
    fn respond(&mut self, socket: &mut Socket, status: StatusCode) -> NetResult<()> {
        ResponseWriter::new(&Response::stock(status)).write_to(socket)
    }

    /// Releases whatever the strategy runs on. Called when the server stops.
    fn stop(&mut self) {}
}

/// Runs handlers on a fixed worker pool so the reactor never waits on them.
pub struct ThreadedHandlerStrategy {
    pool: ThreadPool<Exchange>,
}

impl ThreadedHandlerStrategy {
    /// `threads == 0` uses the available parallelism.
    pub fn new(handler: RequestHandler, max_load: usize, threads: usize) -> Result<Self, PoolError> {
        let pool = ThreadPool::new(threads, max_load, move |exchange: Exchange| {
            exchange.complete(&handler)
        })?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &ThreadPool<Exchange> {
        &self.pool
    }
}

impl HandlerStrategy for ThreadedHandlerStrategy {
    fn handle(&mut self, exchange: Exchange) {
        match self.pool.add(exchange) {
            Ok(Admission::Accepted) => {}
            Ok(Admission::Saturated(exchange)) => {
                warn!(pending = self.pool.pending(), "worker pool saturated");
                exchange.reply(&Response::stock(StatusCode::InternalServerError));
            }
            Err(e) => error!(error = %e, "request dropped"),
        }
    }

    fn stop(&mut self) {
        self.pool.shutdown();
    }
}

/// Runs handlers on the calling (reactor) thread.
pub struct InlineHandlerStrategy {
    handler: RequestHandler,
}

impl InlineHandlerStrategy {
    pub fn new(handler: RequestHandler) -> Self {
        Self { handler }
    }
}

impl HandlerStrategy for InlineHandlerStrategy {
    fn handle(&mut self, exchange: Exchange) {
        exchange.complete(&self.handler);
    }
}
