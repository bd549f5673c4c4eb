//! Handles to live connections and per-recipient delivery results.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::Frame;

/// Connection identifier. Membership is keyed by this, not by the handle.
pub type ConnectionId = Uuid;

/// Why a single delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,
    /// The connection is not draining its queue fast enough.
    #[error("outbound queue full")]
    Full,
}

/// Outcome of delivering one frame to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Failed(DeliveryFailure),
}

impl DeliveryResult {
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Cloneable handle to one live connection.
///
/// Frames are pushed into a bounded queue drained by the connection's writer,
/// so delivery never waits on the peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
    evicted: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its outbound queue.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: Uuid::new_v4(),
            tx,
            evicted: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting.
    #[must_use]
    pub fn deliver(&self, frame: Frame) -> DeliveryResult {
        match self.tx.try_send(frame) {
            Ok(()) => DeliveryResult::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                DeliveryResult::Failed(DeliveryFailure::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                DeliveryResult::Failed(DeliveryFailure::Closed)
            }
        }
    }

    /// Signal the connection's task that it has been evicted.
    pub fn evict(&self) {
        self.evicted.notify_one();
    }

    /// Resolves once `evict` has been called, even if it was called earlier.
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn frame(text: &str) -> Frame {
        Frame::from(text)
    }

    #[test]
    fn test_deliver_queues_frame() {
        let (conn, mut rx) = ConnectionHandle::channel(4);
        assert_eq!(conn.deliver(frame("a")), DeliveryResult::Delivered);
        assert_eq!(&*rx.try_recv().unwrap(), "a");
    }

    #[test]
    fn test_deliver_to_full_queue() {
        let (conn, _rx) = ConnectionHandle::channel(1);
        assert!(conn.deliver(frame("a")).is_delivered());
        assert_eq!(
            conn.deliver(frame("b")),
            DeliveryResult::Failed(DeliveryFailure::Full)
        );
    }

    #[test]
    fn test_deliver_to_closed_queue() {
        let (conn, rx) = ConnectionHandle::channel(4);
        drop(rx);
        assert_eq!(
            conn.deliver(frame("a")),
            DeliveryResult::Failed(DeliveryFailure::Closed)
        );
    }

    #[test]
    fn test_zero_capacity_is_usable() {
        let (conn, _rx) = ConnectionHandle::channel(0);
        assert!(conn.deliver(frame("a")).is_delivered());
    }

    #[tokio::test]
    async fn test_eviction_signal_is_not_lost() {
        let (conn, _rx) = ConnectionHandle::channel(1);
        let clone = conn.clone();
        clone.evict();
        tokio::time::timeout(Duration::from_secs(1), conn.evicted())
            .await
            .expect("eviction signal should be stored");
    }
}
