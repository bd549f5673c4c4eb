//! Fan-out of one message to a session's members.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryResult, Frame, ServerMessage,
    SessionId,
};

/// Outcome of one broadcast sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections that failed delivery and were unregistered.
    pub evicted: Vec<ConnectionId>,
}

/// Delivers messages to every registered connection of a session.
///
/// Failures are collected during the sweep and evicted only once it is
/// complete, so the membership set is never mutated mid-iteration.
#[derive(Debug, Clone)]
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastEngine {
    #[must_use]
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Serialize once and deliver to every member other than `excluding`.
    pub fn broadcast(
        &self,
        session_id: &SessionId,
        message: &ServerMessage,
        excluding: Option<ConnectionId>,
    ) -> BroadcastReport {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%session_id, kind = message.kind(), error = %e, "failed to serialize message");
                return BroadcastReport::default();
            }
        };
        let report = self.broadcast_frame(session_id, &frame, excluding);
        debug!(
            %session_id,
            kind = message.kind(),
            recipients = report.delivered,
            evicted = report.evicted.len(),
            "broadcast"
        );
        report
    }

    /// Deliver a pre-serialized frame to every member other than `excluding`.
    pub fn broadcast_frame(
        &self,
        session_id: &SessionId,
        frame: &Frame,
        excluding: Option<ConnectionId>,
    ) -> BroadcastReport {
        let results: Vec<(ConnectionHandle, DeliveryResult)> = self
            .registry
            .members(session_id)
            .into_iter()
            .filter(|conn| Some(conn.id()) != excluding)
            .map(|conn| {
                let result = conn.deliver(Arc::clone(frame));
                (conn, result)
            })
            .collect();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (conn, result) in results {
            match result {
                DeliveryResult::Delivered => report.delivered += 1,
                DeliveryResult::Failed(reason) => {
                    warn!(%session_id, conn_id = %conn.id(), %reason, "evicting connection");
                    failed.push(conn);
                }
            }
        }

        for conn in failed {
            self.registry.unregister(session_id, conn.id());
            conn.evict();
            report.evicted.push(conn.id());
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn setup() -> (BroadcastEngine, SessionId) {
        let registry = Arc::new(ConnectionRegistry::new());
        (BroadcastEngine::new(registry), SessionId::from("sess0001"))
    }

    fn join(
        engine: &BroadcastEngine,
        session_id: &SessionId,
        capacity: usize,
    ) -> (ConnectionHandle, mpsc::Receiver<Frame>) {
        let (conn, rx) = ConnectionHandle::channel(capacity);
        engine.registry().register(session_id, conn.clone());
        (conn, rx)
    }

    fn recv(rx: &mut mpsc::Receiver<Frame>) -> ServerMessage {
        let frame = rx.try_recv().expect("frame queued");
        serde_json::from_str(&frame).unwrap()
    }

    #[test]
    fn test_broadcast_reaches_all_members() {
        let (engine, sid) = setup();
        let (_a, mut rx_a) = join(&engine, &sid, 8);
        let (_b, mut rx_b) = join(&engine, &sid, 8);

        let msg = ServerMessage::Participants { count: 2 };
        let report = engine.broadcast(&sid, &msg, None);

        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());
        assert_eq!(recv(&mut rx_a), msg);
        assert_eq!(recv(&mut rx_b), msg);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let (engine, sid) = setup();
        let (a, mut rx_a) = join(&engine, &sid, 8);
        let (_b, mut rx_b) = join(&engine, &sid, 8);

        let msg = ServerMessage::CodeChange { code: "x=1".into() };
        let report = engine.broadcast(&sid, &msg, Some(a.id()));

        assert_eq!(report.delivered, 1);
        assert_eq!(recv(&mut rx_b), msg);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_stays_within_session() {
        let (engine, sid) = setup();
        let other = SessionId::from("sess0002");
        let (_a, _rx_a) = join(&engine, &sid, 8);
        let (_b, mut rx_b) = join(&engine, &other, 8);

        engine.broadcast(&sid, &ServerMessage::Participants { count: 1 }, None);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_failed_delivery_evicts_after_sweep() {
        let (engine, sid) = setup();
        let (dead, rx_dead) = join(&engine, &sid, 8);
        let (_live, mut rx_live) = join(&engine, &sid, 8);
        drop(rx_dead);

        let msg = ServerMessage::LanguageChange {
            language: "rust".into(),
        };
        let report = engine.broadcast(&sid, &msg, None);

        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![dead.id()]);
        assert_eq!(recv(&mut rx_live), msg);
        assert_eq!(engine.registry().count(&sid), 1);
        assert!(!engine.registry().contains(&sid, dead.id()));
    }

    #[tokio::test]
    async fn test_slow_consumer_is_evicted_and_signalled() {
        let (engine, sid) = setup();
        let (slow, _rx_slow) = join(&engine, &sid, 1);
        let (_fast, mut rx_fast) = join(&engine, &sid, 8);

        let first = ServerMessage::CodeChange { code: "a".into() };
        let second = ServerMessage::CodeChange { code: "b".into() };
        engine.broadcast(&sid, &first, None);
        let report = engine.broadcast(&sid, &second, None);

        assert_eq!(report.evicted, vec![slow.id()]);
        assert_eq!(recv(&mut rx_fast), first);
        assert_eq!(recv(&mut rx_fast), second);
        tokio::time::timeout(std::time::Duration::from_secs(1), slow.evicted())
            .await
            .expect("evicted connection is signalled");
    }

    #[test]
    fn test_per_recipient_order_is_preserved() {
        let (engine, sid) = setup();
        let (_a, mut rx_a) = join(&engine, &sid, 16);

        for i in 0..5 {
            engine.broadcast(&sid, &ServerMessage::CodeChange { code: i.to_string() }, None);
        }
        for i in 0..5 {
            assert_eq!(
                recv(&mut rx_a),
                ServerMessage::CodeChange { code: i.to_string() }
            );
        }
    }

    #[test]
    fn test_broadcast_to_empty_session() {
        let (engine, sid) = setup();
        let report = engine.broadcast(&sid, &ServerMessage::Participants { count: 0 }, None);
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(engine.registry().active_sessions(), 0);
    }
}
