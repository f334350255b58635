//! Shutdown coordination.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Triggering is idempotent: the first call flips the signal, later calls do
/// nothing. Every waiter, including ones that start waiting after the
/// trigger, observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns true only for the call that actually flipped it.
    pub fn trigger(&self) -> bool {
        let flipped = self.tx.send_if_modified(|triggered| !std::mem::replace(triggered, true));
        if flipped {
            tracing::info!("Shutdown triggered");
        }
        flipped
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub fn signaled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // dropping every coordinator also ends the wait
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
