//! Per-session connection membership.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{ConnectionHandle, ConnectionId, SessionId};

type Members = HashMap<ConnectionId, ConnectionHandle>;

/// Membership sets keyed by session.
///
/// An entry exists only while its set is non-empty, so `count` never sees a
/// stale empty set. Delivery is left to `BroadcastEngine`, the only reader of
/// `members`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Members>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Members>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Members>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection to a session's set.
    ///
    /// Returns false if it was already registered; the set is unchanged.
    pub fn register(&self, session_id: &SessionId, conn: ConnectionHandle) -> bool {
        let mut sessions = self.write();
        let members = sessions.entry(session_id.clone()).or_default();
        if members.contains_key(&conn.id()) {
            return false;
        }
        members.insert(conn.id(), conn);
        true
    }

    /// Remove a connection, dropping the session's entry once it is empty.
    ///
    /// Returns false if the connection was not registered.
    pub fn unregister(&self, session_id: &SessionId, conn_id: ConnectionId) -> bool {
        let mut sessions = self.write();
        let Some(members) = sessions.get_mut(session_id) else {
            return false;
        };
        let removed = members.remove(&conn_id).is_some();
        if members.is_empty() {
            sessions.remove(session_id);
        }
        removed
    }

    /// Number of connections attached to a session.
    #[must_use]
    pub fn count(&self, session_id: &SessionId) -> usize {
        self.read().get(session_id).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn contains(&self, session_id: &SessionId, conn_id: ConnectionId) -> bool {
        self.read()
            .get(session_id)
            .is_some_and(|members| members.contains_key(&conn_id))
    }

    /// Number of sessions with at least one connection.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.read().len()
    }

    /// Snapshot of a session's members.
    pub(crate) fn members(&self, session_id: &SessionId) -> Vec<ConnectionHandle> {
        self.read()
            .get(session_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }
}
