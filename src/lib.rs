//! Single-port multiplexer for RPC, REST gateway and push-delivery traffic.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod push;
pub mod routing;

pub use config::MuxConfig;
pub use http::{Server, ServerError, ServerState};
pub use lifecycle::Shutdown;
pub use routing::{Delegate, Handler, Multiplexer, Outcome, PushRoutes};
