//! Socket layer and the `select`-based stream service.
//!
//! - **`socket`**: owned stream sockets with blocking and would-block-aware I/O
//! - **`acceptor`**: listening sockets
//! - **`endpoint`**: synchronous host/port resolution
//! - **`service`**: the single-threaded readiness loop with idle timeouts
//! - **`signal`**: the process-wide signal channel consumed by the service
//! - **`error`**: the typed error taxonomy for all of the above

pub mod acceptor;
pub mod endpoint;
pub mod error;
pub mod service;
pub mod signal;
pub mod socket;
mod sys;

pub use acceptor::Acceptor;
pub use endpoint::{Endpoint, Protocol};
pub use error::{NetError, NetResult};
pub use service::{ReadFailure, ServiceHandler, StreamService, Token};
pub use signal::SignalSet;
pub use socket::{Socket, SocketOption};
