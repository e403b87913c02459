//! Availability gate.
//!
//! A latch with two states. While closed, `wait_open` suspends; opening the
//! gate wakes every waiter at once.

use tokio::sync::watch;

#[derive(Debug)]
pub struct AvailabilityGate {
    tx: watch::Sender<bool>,
}

impl AvailabilityGate {
    /// Create an open gate.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }

    /// Whether callers currently pass straight through.
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Close the gate. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|open| std::mem::replace(open, false))
    }

    /// Open the gate and release all waiters. Returns `false` if it was already open.
    pub fn open(&self) -> bool {
        self.tx.send_if_modified(|open| !std::mem::replace(open, true))
    }

    /// Wait until the gate is open.
    pub async fn wait_open(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for AvailabilityGate {
    fn default() -> Self {
        Self::new()
    }
}
