//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → drains connections → exits
//! ```
//!
//! # Design Decisions
//! - One coordinator per process, passed explicitly to whoever needs it
//! - Triggering more than once has no further effect
//! - Shutdown has timeout: the server reports when the drain overruns it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
