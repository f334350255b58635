//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (HTTP/1.1 or h2c prior knowledge)
//!     → server.rs (accept loop, protocol detection, graceful drain)
//!     → request.rs (request ID for the exchange span)
//!     → [multiplexer picks a handler]
//!     → response.rs (fixed answers and error bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use response::{no_handler_fulfilled, NO_HANDLER_FULFILLED};
pub use server::{start, Server, ServerError, ServerState};
