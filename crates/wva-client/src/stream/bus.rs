//! Fan-out of decoded events to registered listeners

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use super::types::StreamEvent;

/// Receives every event decoded from the stream
///
/// Listeners run on the stream task, one after another. A slow listener
/// delays delivery to the others, so hand heavy work off to a channel.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &StreamEvent) -> anyhow::Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&StreamEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &StreamEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Shared listener reference; identity is the allocation
pub type Listener = Arc<dyn EventListener>;

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Set of listeners keyed by identity
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub fn add_listener(&self, listener: Listener) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to a snapshot of the current listeners
    ///
    /// A listener that returns an error or panics is logged and skipped.
    /// Returns the number of listeners that handled the event cleanly.
    pub fn publish(&self, event: &StreamEvent) -> usize {
        let snapshot: Vec<Listener> = self.listeners.read().clone();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!(error = %e, "Event listener failed"),
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(panic = %msg, "Event listener panicked");
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
