use std::sync::Arc;

use tokio::sync::watch;

/// Counts gateway requests that participate in the shared UI-disable
/// contract. Increment/decrement pairing is enforced with an RAII guard, so
/// the count can never go negative and returns to zero exactly when no
/// participating request is outstanding.
///
/// Steady-state live polls do not take a guard: an outstanding long poll
/// must not visually block input for its (potentially multi-minute)
/// duration.
#[derive(Clone)]
pub struct BusyCounter {
    tx: Arc<watch::Sender<usize>>,
}

impl BusyCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Marks one participating request as in flight until the returned
    /// guard is dropped.
    pub fn begin(&self) -> BusyGuard {
        self.tx.send_modify(|count| *count += 1);
        BusyGuard {
            tx: Arc::clone(&self.tx),
        }
    }

    pub fn count(&self) -> usize {
        *self.tx.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }

    /// Observer channel for UI code that wants to enable/disable input as
    /// the count crosses zero.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }
}

impl Default for BusyCounter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusyGuard {
    tx: Arc<watch::Sender<usize>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tx.send_modify(|count| *count = count.saturating_sub(1));
    }
}
