//! Graceful HTTP server.
//!
//! # Responsibilities
//! - Own exactly one listener for the server's lifetime
//! - Serve HTTP/1.1 and cleartext HTTP/2 (prior knowledge) on the same port
//! - Hand every exchange to the multiplexer
//! - Stop accepting on the first shutdown signal, drain, and bound the drain
//!
//! # States
//! ```text
//! Created → Serving → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - The connection builder sniffs the HTTP/2 preface, so RPC framing works
//!   without TLS
//! - A drain that overruns the timeout is an error, distinct from a clean stop
//! - Accept errors are retried after a short pause; only a closed
//!   connection limit ends serving

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::routing::Multiplexer;

/// Pause after a failed accept, so fd exhaustion does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors ending a server's life.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("graceful shutdown timed out after {timeout:?} with {open_connections} connections still open")]
    ShutdownTimeout {
        timeout: Duration,
        open_connections: u64,
    },
}

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Listener bound, not yet accepting.
    Created,
    /// Accept loop running.
    Serving,
    /// No longer accepting; draining open connections.
    ShuttingDown,
    /// Terminal.
    Stopped,
}

/// An HTTP server bound to one listener with graceful shutdown.
#[derive(Debug)]
pub struct Server {
    listener: Listener,
    host: Option<String>,
    shutdown_timeout: Duration,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// Bind the listener. Port `0` picks an ephemeral port.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = Listener::bind(config).await?;
        let (state, _) = watch::channel(ServerState::Created);
        Ok(Self {
            listener,
            host: config.host.clone(),
            shutdown_timeout: config.shutdown_timeout(),
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// IP address the listener is bound to.
    pub fn ip(&self) -> IpAddr {
        self.local_addr().ip()
    }

    /// Port the listener is bound to, resolved if ephemeral.
    pub fn port(&self) -> u16 {
        self.local_addr().port()
    }

    /// Host as configured, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Follow the server's lifecycle.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until `signal` resolves, then drain for at most the shutdown timeout.
    pub async fn serve<F>(self, mux: Multiplexer, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            shutdown_timeout,
            state,
            ..
        } = self;
        let local_addr = listener.local_addr();

        let builder = auto::Builder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let tracker = ConnectionTracker::new();

        tokio::pin!(signal);
        state.send_replace(ServerState::Serving);
        tracing::info!(address = %local_addr, "HTTP server serving");

        let served = loop {
            let accepted = tokio::select! {
                biased;
                () = &mut signal => break Ok(()),
                accepted = listener.accept() => accepted,
            };

            let (stream, peer_addr, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(err) if err.is_transient() => {
                    tracing::warn!(error = %err, retry_in = ?ACCEPT_RETRY_DELAY, "Accept failed, retrying");
                    tokio::select! {
                        biased;
                        () = &mut signal => break Ok(()),
                        () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => continue,
                    }
                }
                Err(err) => break Err(ServerError::from(err)),
            };

            let guard = tracker.track();
            let span = tracing::debug_span!("connection", connection_id = %guard.id(), peer_addr = %peer_addr);
            let conn = builder
                .serve_connection(TokioIo::new(stream), TowerToHyperService::new(mux.clone()))
                .into_owned();
            let conn = graceful.watch(conn);

            tokio::spawn(
                async move {
                    if let Err(err) = conn.await {
                        tracing::debug!(error = %err, "Connection ended with error");
                    }
                    drop(permit);
                    drop(guard);
                }
                .instrument(span),
            );
        };

        // stop accepting before draining
        drop(listener);
        state.send_replace(ServerState::ShuttingDown);

        if let Err(err) = served {
            tracing::error!(error = %err, "Accept loop failed");
            // Fatal accept errors still drain what is already running.
            let _ = tokio::time::timeout(shutdown_timeout, graceful.shutdown()).await;
            state.send_replace(ServerState::Stopped);
            return Err(err);
        }

        tracing::info!(
            open_connections = tracker.active_count(),
            timeout = ?shutdown_timeout,
            "Draining connections"
        );

        let drained = tokio::time::timeout(shutdown_timeout, graceful.shutdown()).await;
        state.send_replace(ServerState::Stopped);

        match drained {
            Ok(()) => {
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                let open_connections = tracker.active_count();
                tracing::error!(open_connections, timeout = ?shutdown_timeout, "Graceful shutdown timed out");
                Err(ServerError::ShutdownTimeout {
                    timeout: shutdown_timeout,
                    open_connections,
                })
            }
        }
    }
}

/// Bind according to `config` and serve `mux` until `signal` resolves.
pub async fn start<F>(config: &ServerConfig, mux: Multiplexer, signal: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send,
{
    Server::bind(config).await?.serve(mux, signal).await
}
