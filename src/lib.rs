//! Warden - embeddable HTTP/1.0 server
//!
//! A single-threaded `select` reactor accepts and reads connections, a
//! character-driven parser assembles requests, and a fixed worker pool runs
//! the request handler off the reactor thread.

pub mod config;
pub mod http;
pub mod net;
pub mod pool;
pub mod router;
pub mod server;
