//! Global pointer listener bookkeeping.
//!
//! A drag needs pointer events from the whole surface, not just from the
//! divider that started it. The surrounding UI attaches one global listener
//! per [`ListenerGuard`] and detaches it when the guard is dropped, so a
//! listener can never outlive the drag that owns it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts the global pointer listeners currently attached.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    active: Arc<AtomicUsize>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener; it stays attached until the guard is dropped.
    pub fn attach(&self) -> ListenerGuard {
        let count = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(active = count, "pointer listener attached");
        ListenerGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Number of attached listeners.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// An attached listener.
#[derive(Debug)]
#[must_use = "the listener detaches as soon as the guard is dropped"]
pub struct ListenerGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let count = self.active.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!(active = count, "pointer listener detached");
    }
}
