// SPDX-License-Identifier: GPL-3.0-only

//! Keep-only-latest frame channel
//!
//! A single-slot channel with overwrite-on-full semantics: sending while a
//! value is still waiting replaces it, and the replaced value is handed back
//! to the sender (and usually dropped on the spot). The consumer therefore
//! never sees a backlog, only the newest value at the moment it asks.
//!
//! Unlike `tokio::sync::watch`, values are moved out rather than borrowed,
//! so a frame's release obligation travels with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct Shared<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
    sender_closed: AtomicBool,
    receiver_closed: AtomicBool,
}

impl<T> Shared<T> {
    fn take(&self) -> Option<T> {
        // A poisoned slot only means a panic elsewhere; the Option is still valid
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Error returned when the receiving half has been dropped
#[derive(Debug)]
pub struct SendError<T>(pub T);

impl<T> std::fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "receiver dropped")
    }
}

impl<T: std::fmt::Debug> std::error::Error for SendError<T> {}

/// Producing half
pub struct LatestSender<T> {
    shared: Arc<Shared<T>>,
}

/// Consuming half
pub struct LatestReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Create a keep-only-latest channel
pub fn channel<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        notify: Notify::new(),
        sender_closed: AtomicBool::new(false),
        receiver_closed: AtomicBool::new(false),
    });
    (
        LatestSender {
            shared: Arc::clone(&shared),
        },
        LatestReceiver { shared },
    )
}

impl<T> LatestSender<T> {
    /// Publish `value`, returning the value it superseded, if any
    pub fn send(&self, value: T) -> Result<Option<T>, SendError<T>> {
        if self.shared.receiver_closed.load(Ordering::Acquire) {
            return Err(SendError(value));
        }

        let superseded = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(value);
        self.shared.notify.notify_one();
        Ok(superseded)
    }

    /// Whether the receiver has been dropped
    pub fn is_closed(&self) -> bool {
        self.shared.receiver_closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for LatestSender<T> {
    fn drop(&mut self) {
        self.shared.sender_closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

impl<T> LatestReceiver<T> {
    /// Wait for the next value
    ///
    /// Returns `None` once the sender is gone and the slot is empty. A value
    /// published just before the sender dropped is still delivered.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.shared.take() {
                return Some(value);
            }
            if self.shared.sender_closed.load(Ordering::Acquire) {
                // Re-check: the final send may have raced with the close flag
                return self.shared.take();
            }
            // notify_one stores a permit, so a send between the checks above
            // and this await is not lost
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending value without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.take()
    }
}

impl<T> Drop for LatestReceiver<T> {
    fn drop(&mut self) {
        self.shared.receiver_closed.store(true, Ordering::Release);
        // Release whatever is still parked in the slot
        drop(self.shared.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_send_overwrites_pending_value() {
        let (tx, mut rx) = channel();

        assert!(matches!(tx.send(1), Ok(None)));
        assert!(matches!(tx.send(2), Ok(Some(1))));
        assert!(matches!(tx.send(3), Ok(Some(2))));

        assert_eq!(rx.try_recv(), Some(3));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);

        assert!(tx.is_closed());
        let err = tx.send(7).unwrap_err();
        assert_eq!(err.0, 7);
    }

    #[tokio::test]
    async fn test_recv_waits_for_value() {
        let (tx, mut rx) = channel();

        let consumer = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send("frame").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke up")
            .unwrap();
        assert_eq!(received, Some("frame"));
    }

    #[tokio::test]
    async fn test_recv_drains_then_ends_after_sender_drop() {
        let (tx, mut rx) = channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_dropping_receiver_drops_pending_value() {
        let value = Arc::new(());
        let (tx, rx) = channel();
        tx.send(Arc::clone(&value)).unwrap();
        assert_eq!(Arc::strong_count(&value), 2);

        drop(rx);
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
