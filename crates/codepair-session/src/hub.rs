//! Per-session coordination of state, membership and fan-out.
//!
//! Every event that touches a session (attach, a client mutation, detach)
//! runs inside that session's gate, so a mutation and the broadcast announcing
//! it are never interleaved with another event for the same session. Gates are
//! only held for non-blocking work: store updates and queueing frames.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use codepair_core::{
    BroadcastEngine, BroadcastReport, ClientMessage, ConnectionHandle, ConnectionId,
    ConnectionRegistry, DeliveryResult, ServerMessage, SessionError, SessionId, SessionInfo,
    SessionStore,
};
use tracing::{debug, info, warn};

use crate::Attachment;

/// Default depth of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Smallest usable queue depth: `init` and the first `participants` frame
/// are queued together on attach.
pub const MIN_OUTBOUND_CAPACITY: usize = 2;

type Gate = Arc<Mutex<()>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session hub tying a store to connection membership and broadcast.
pub struct SessionHub<S>
where
    S: SessionStore,
{
    store: S,
    broadcaster: BroadcastEngine,
    gates: Mutex<HashMap<SessionId, Gate>>,
    outbound_capacity: usize,
}

impl<S> SessionHub<S>
where
    S: SessionStore,
{
    /// Create a new hub over a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_outbound_capacity(store, DEFAULT_OUTBOUND_CAPACITY)
    }

    /// Create a hub whose connections queue at most `capacity` frames.
    ///
    /// Capacities below [`MIN_OUTBOUND_CAPACITY`] are raised to it.
    #[must_use]
    pub fn with_outbound_capacity(store: S, capacity: usize) -> Self {
        Self {
            store,
            broadcaster: BroadcastEngine::new(Arc::new(ConnectionRegistry::new())),
            gates: Mutex::new(HashMap::new()),
            outbound_capacity: capacity.max(MIN_OUTBOUND_CAPACITY),
        }
    }

    /// Depth of each connection's outbound queue.
    #[must_use]
    pub const fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        self.broadcaster.registry()
    }

    fn gate_for(&self, session_id: &SessionId) -> Gate {
        Arc::clone(lock(&self.gates).entry(session_id.clone()).or_default())
    }

    fn gate(&self, session_id: &SessionId) -> Result<Gate, SessionError> {
        if !self.store.contains(session_id) {
            return Err(SessionError::NotFound(session_id.clone()));
        }
        Ok(self.gate_for(session_id))
    }

    /// Create a new session.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn create_session(&self) -> Result<SessionId, SessionError> {
        let session_id = self.store.create()?;
        info!(%session_id, "session created");
        Ok(session_id)
    }

    /// Session state with its current participant count.
    ///
    /// # Errors
    /// Returns `NotFound` if the session does not exist.
    pub fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo, SessionError> {
        let gate = self.gate(session_id)?;
        let _guard = lock(&gate);
        let session = self.store.get(session_id)?;
        Ok(SessionInfo::new(session, self.registry().count(session_id)))
    }

    /// Attach a new connection to a session.
    ///
    /// The connection is registered, sent an `init` snapshot, and every member
    /// (itself included) is sent the new participant count. Unknown sessions
    /// are rejected without touching the registry.
    ///
    /// # Errors
    /// Returns `NotFound` if the session does not exist.
    pub fn attach(self: &Arc<Self>, session_id: &SessionId) -> Result<Attachment<S>, SessionError> {
        let gate = self.gate(session_id)?;
        let _guard = lock(&gate);

        let session = self.store.get(session_id)?;
        let (handle, outbound) = ConnectionHandle::channel(self.outbound_capacity);
        self.registry().register(session_id, handle.clone());

        let init = ServerMessage::Init {
            code: session.code,
            language: session.language,
        };
        match init.to_frame() {
            Ok(frame) => {
                if let DeliveryResult::Failed(reason) = handle.deliver(frame) {
                    warn!(%session_id, conn_id = %handle.id(), %reason, "failed to queue init");
                }
            }
            Err(e) => warn!(%session_id, error = %e, "failed to serialize init"),
        }

        let count = self.registry().count(session_id);
        self.broadcaster
            .broadcast(session_id, &ServerMessage::Participants { count }, None);

        info!(%session_id, conn_id = %handle.id(), count, "connection attached");

        Ok(Attachment::new(
            Arc::clone(self),
            session_id.clone(),
            handle,
            outbound,
        ))
    }

    /// Apply one client message and relay it to the other members.
    ///
    /// Returns `None` for ignored message types.
    ///
    /// # Errors
    /// Returns `NotAttached` if the sender is no longer registered, or a
    /// store error if the update fails.
    pub fn dispatch(
        &self,
        session_id: &SessionId,
        sender: ConnectionId,
        message: ClientMessage,
    ) -> Result<Option<BroadcastReport>, SessionError> {
        let gate = self.gate(session_id)?;
        let _guard = lock(&gate);

        if !self.registry().contains(session_id, sender) {
            return Err(SessionError::NotAttached(sender));
        }

        let outbound = match message {
            ClientMessage::CodeChange { code } => {
                self.store.set_code(session_id, code.clone())?;
                ServerMessage::CodeChange { code }
            }
            ClientMessage::LanguageChange { language } => {
                self.store.set_language(session_id, language.clone())?;
                ServerMessage::LanguageChange { language }
            }
            ClientMessage::CursorPosition { user_id, position } => {
                ServerMessage::CursorPosition { user_id, position }
            }
            ClientMessage::Unknown => {
                debug!(%session_id, conn_id = %sender, "ignoring unknown message type");
                return Ok(None);
            }
        };

        Ok(Some(self.broadcaster.broadcast(
            session_id,
            &outbound,
            Some(sender),
        )))
    }

    /// Remove a connection and announce the remaining count.
    ///
    /// Returns the remaining participant count.
    pub(crate) fn detach(&self, session_id: &SessionId, conn_id: ConnectionId) -> usize {
        let gate = self.gate_for(session_id);
        let _guard = lock(&gate);

        let was_registered = self.registry().unregister(session_id, conn_id);
        let count = self.registry().count(session_id);
        self.broadcaster
            .broadcast(session_id, &ServerMessage::Participants { count }, None);

        info!(%session_id, %conn_id, count, was_registered, "connection detached");
        count
    }
}
