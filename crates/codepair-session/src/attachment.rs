//! A connection's membership in one session.
//!
//! Holding an `Attachment` is the attached state; dropping it is the close.
//! The drop unregisters the connection and announces the new participant
//! count, so cleanup runs exactly once however the connection ends.

use std::{fmt, sync::Arc};

use codepair_core::{
    BroadcastReport, ClientMessage, ConnectionHandle, ConnectionId, Frame, SessionError,
    SessionId, SessionStore,
};
use tokio::sync::mpsc;

use crate::SessionHub;

/// An attached connection.
pub struct Attachment<S>
where
    S: SessionStore,
{
    hub: Arc<SessionHub<S>>,
    session_id: SessionId,
    handle: ConnectionHandle,
    outbound: Option<mpsc::Receiver<Frame>>,
}

impl<S> Attachment<S>
where
    S: SessionStore,
{
    pub(crate) const fn new(
        hub: Arc<SessionHub<S>>,
        session_id: SessionId,
        handle: ConnectionHandle,
        outbound: mpsc::Receiver<Frame>,
    ) -> Self {
        Self {
            hub,
            session_id,
            handle,
            outbound: Some(outbound),
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Take the queue of frames destined for this connection.
    ///
    /// Already holds `init` and the first `participants` frame. Returns
    /// `None` after the first call.
    pub fn take_outbound(&mut self) -> Option<mpsc::Receiver<Frame>> {
        self.outbound.take()
    }

    /// Apply a message from this connection.
    ///
    /// # Errors
    /// Returns `NotAttached` once the connection has been evicted.
    pub fn dispatch(&self, message: ClientMessage) -> Result<Option<BroadcastReport>, SessionError> {
        self.hub
            .dispatch(&self.session_id, self.handle.id(), message)
    }

    /// Resolves once a broadcast has evicted this connection.
    pub async fn evicted(&self) {
        self.handle.evicted().await;
    }
}

impl<S> fmt::Debug for Attachment<S>
where
    S: SessionStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("session_id", &self.session_id)
            .field("connection_id", &self.handle.id())
            .finish_non_exhaustive()
    }
}

impl<S> Drop for Attachment<S>
where
    S: SessionStore,
{
    fn drop(&mut self) {
        self.hub.detach(&self.session_id, self.handle.id());
    }
}
