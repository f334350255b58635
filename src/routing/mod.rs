//! Classification and dispatch.
//!
//! # Data Flow
//! ```text
//! Incoming exchange (version, method, headers)
//!     → multiplexer.rs (handlers in registration order)
//!     → handler.rs (AND of its selectors)
//!     → selector.rs (signature checks, no I/O)
//!     → delegate.rs (backend answers the exchange)
//!     → no claim at all: fixed 404
//! ```
//!
//! # Design Decisions
//! - Handlers built at startup, immutable at runtime
//! - Deterministic: same input always reaches the same handler
//! - First claim wins (ordered by registration)

pub mod delegate;
pub mod handler;
pub mod multiplexer;
pub mod selector;

pub use delegate::Delegate;
pub use handler::{Handler, Outcome, PushRoutes};
pub use multiplexer::{Multiplexer, MultiplexerBuilder};
pub use selector::{
    is_push_request, is_rpc_request, is_rpc_web_request, AllOf, AnyOf, FnSelector, PushSelector,
    RpcSelector, RpcWebPreflightSelector, RpcWebSelector, Selector,
};
