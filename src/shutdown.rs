//! # Shutdown Signal
//!
//! Supervisory cancellation shared by every background task.
//!
//! Tasks hold a [`ShutdownSignal`] and select on [`ShutdownSignal::cancelled`]
//! next to their blocking operation, so they stop once that operation
//! unblocks. Dropping the [`Shutdown`] handle counts as a trigger.

use tokio::sync::watch;

/// Owner side of the shutdown signal
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Receiver side, cloned into each task
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// New receiver for a task
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Ask every task to stop
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// True once shutdown was requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when shutdown is requested or the owner is dropped
    pub async fn cancelled(&mut self) {
        if self.is_triggered() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow_and_update() {
                return;
            }
        }
    }
}
