//! Lifecycle coordination for the evaluation tasks.
//!
//! # Data Flow
//! ```text
//! Shutdown:
//!     trigger() → broadcast to every periodic loop and recovery timer
//!     → loops exit their select!, handles become joinable
//! ```
//!
//! # Design Decisions
//! - A broadcast channel rather than fire-and-forget timers, so no timer
//!   outlives the process intentionally
//! - In-flight wrapped operations are abandoned, not forcibly killed; they
//!   are caller-owned

use tokio::sync::broadcast;

/// Coordinator for stopping the periodic evaluation tasks.
///
/// Provides a broadcast channel that all long-running tasks subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening for the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
