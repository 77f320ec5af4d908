//! HTTP/1.0 protocol implementation.
//!
//! - **`uri`**: request-target views (query, path, segments, decoding)
//! - **`request`**: the parsed request and a builder for constructing one
//! - **`parser`**: character-driven request-line and header state machine
//! - **`response`**: status codes and responses with a builder
//! - **`writer`**: serializes and writes responses to a socket
//! - **`connection`**: the per-client read/dispatch/write state machine
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← request line and headers, one octet at a time
//!        └──────┬──────┘
//!               │ CRLFCRLF seen
//!               ▼
//!        ┌──────────────────┐
//!        │   ReadingBody    │ ← until Content-Length octets arrived
//!        └──────┬───────────┘
//!               │
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← handler runs (worker pool or inline)
//!        └──────┬───────────┘
//!               │
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← response sent
//!        └──────┬───────────┘
//!               ▼
//!             Closed
//! ```
//!
//! There is no keep-alive: every response is followed by a shutdown.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod uri;
pub mod writer;

pub use connection::{Connection, ConnectionLimits, ConnectionState, Progress};
pub use parser::{ParseResult, RequestParser};
pub use request::{Header, Request, RequestBuilder, Version};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use uri::Uri;
