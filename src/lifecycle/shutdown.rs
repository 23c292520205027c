//! Stop coordination for background checks.
//!
//! A single trigger fans out to every health loop. The first trigger wins;
//! later ones are ignored, and loops started afterwards can see that a stop
//! was already requested.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

#[derive(Debug)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    requested: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            requested: AtomicBool::new(false),
        }
    }

    /// Receiver that resolves once a stop is requested.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Request a stop. Returns false if one was already requested.
    pub fn trigger(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        let listeners = self.notify.send(()).unwrap_or(0);
        tracing::info!(listeners, "Stopping background checks");
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
