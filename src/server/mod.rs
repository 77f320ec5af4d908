//! The server front-end: one listening acceptor, the termination signals
//! and a handler strategy, all driven by a single [`StreamService`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden::config::Config;
//! use warden::http::Response;
//! use warden::server::{RequestHandler, Server};
//!
//! let handler: RequestHandler = Arc::new(|_| Ok(Response::ok("hello")));
//! let mut server = Server::new(&Config::default(), handler)?;
//! let signal = server.run()?;
//! println!("stopped by signal {signal}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod listener;
pub mod registry;
pub mod strategy;

use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;

use crate::config::{Config, ServerConfig};
use crate::net::{NetError, NetResult, SignalSet, StreamService};
use crate::pool::PoolError;

pub use registry::ConnectionRegistry;
pub use strategy::{
    Exchange, HandlerStrategy, InlineHandlerStrategy, RequestHandler, ThreadedHandlerStrategy,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub struct Server<S: HandlerStrategy = ThreadedHandlerStrategy> {
    service: StreamService,
    registry: ConnectionRegistry<S>,
    local_addr: SocketAddr,
}

impl Server<ThreadedHandlerStrategy> {
    /// Binds the configured address and starts the worker pool.
    pub fn new(config: &Config, handler: RequestHandler) -> Result<Self, ServerError> {
        let strategy =
            ThreadedHandlerStrategy::new(handler, config.pool.max_load, config.pool.threads)?;
        info!(
            workers = strategy.pool().threads(),
            max_load = config.pool.max_load,
            "worker pool started"
        );
        Self::with_strategy(&config.server, strategy)
    }
}

impl<S: HandlerStrategy> Server<S> {
    /// Binds the configured address and dispatches requests through
    /// `strategy`. Signal registration, bind and listen failures are fatal.
    pub fn with_strategy(config: &ServerConfig, strategy: S) -> Result<Self, ServerError> {
        let mut service = StreamService::with_idle_timeout(config.idle_timeout());
        service.add_signals(SignalSet::termination()?)?;

        let acceptor = listener::bind(config)?;
        let local_addr = acceptor.local_addr()?;
        service.add_acceptor(acceptor)?;

        Ok(Self {
            service,
            registry: ConnectionRegistry::new(strategy, config.buffer_size, config.limits()),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections still being read.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn strategy(&self) -> &S {
        self.registry.strategy()
    }

    /// Serves until a termination signal arrives and returns its number.
    pub fn run(&mut self) -> NetResult<i32> {
        let result = self.service.run(&mut self.registry);
        self.registry.strategy_mut().stop();
        result
    }

    /// Runs a single reactor turn. `Some(code)` means the server stopped.
    pub fn turn(&mut self) -> NetResult<Option<i32>> {
        let stopped = self.service.turn(&mut self.registry)?;
        if stopped.is_some() {
            self.registry.strategy_mut().stop();
        }
        Ok(stopped)
    }
}
