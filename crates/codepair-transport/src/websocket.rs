//! WebSocket transport for session participants.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
    routing::{get, post},
};
use codepair_core::{SessionError, SessionId, SessionStore};
use codepair_session::SessionHub;
use futures::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{
    TransportConfig, api,
    protocol::{self, CLOSE_SESSION_NOT_FOUND, REASON_SESSION_NOT_FOUND},
};

/// Close reason sent to a connection dropped for falling behind.
pub const REASON_EVICTED: &str = "too slow, reconnect";

/// How long an evicted connection's writer gets to flush its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handler state shared by the WebSocket and HTTP routes.
pub struct AppState<S>
where
    S: SessionStore,
{
    /// Session hub.
    pub hub: Arc<SessionHub<S>>,
    /// Per-connection limits.
    pub config: TransportConfig,
}

impl<S> AppState<S>
where
    S: SessionStore,
{
    /// Create new handler state.
    #[must_use]
    pub const fn new(hub: Arc<SessionHub<S>>, config: TransportConfig) -> Self {
        Self { hub, config }
    }
}

impl<S> Clone for AppState<S>
where
    S: SessionStore,
{
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            config: self.config,
        }
    }
}

/// WebSocket upgrade handler for `/ws/{session_id}`.
pub async fn ws_handler<S>(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState<S>>,
) -> impl IntoResponse
where
    S: SessionStore + 'static,
{
    let session_id = SessionId::from(session_id);
    ws.max_message_size(state.config.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {e}");
    }
}

async fn handle_socket<S>(mut socket: WebSocket, session_id: SessionId, state: AppState<S>)
where
    S: SessionStore + 'static,
{
    let mut attachment = match state.hub.attach(&session_id) {
        Ok(attachment) => attachment,
        Err(SessionError::NotFound(_)) => {
            info!(%session_id, "rejecting connection to unknown session");
            close(&mut socket, CLOSE_SESSION_NOT_FOUND, REASON_SESSION_NOT_FOUND).await;
            return;
        }
        Err(e) => {
            error!(%session_id, error = %e, "failed to attach connection");
            close(&mut socket, close_code::ERROR, "internal error").await;
            return;
        }
    };
    let conn_id = attachment.connection_id();
    let Some(mut outbound) = attachment.take_outbound() else {
        return;
    };

    let (mut sender, mut receiver) = socket.split();
    let (close_tx, mut close_rx) = oneshot::channel::<CloseFrame>();

    // Drain the outbound queue into the socket until told to close
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                closing = &mut close_rx => {
                    if let Ok(frame) = closing {
                        if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                            debug!("Failed to send close frame: {e}");
                        }
                    }
                    break;
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let evicted = loop {
        tokio::select! {
            () = attachment.evicted() => {
                warn!(%session_id, %conn_id, "closing evicted connection");
                break true;
            }
            _ = &mut send_task => break false,
            incoming = receiver.next() => {
                let decoded = match incoming {
                    Some(Ok(Message::Text(text))) => protocol::decode(text.as_str()),
                    Some(Ok(Message::Binary(data))) => protocol::decode_binary(&data),
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(%session_id, %conn_id, "WebSocket error: {e}");
                        break false;
                    }
                };

                let message = match decoded {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(%session_id, %conn_id, "Invalid client message: {e}");
                        continue;
                    }
                };

                match attachment.dispatch(message) {
                    Ok(_) => {}
                    Err(e @ SessionError::NotAttached(_)) => {
                        warn!(%session_id, %conn_id, "{e}");
                        break false;
                    }
                    Err(e) => error!(%session_id, %conn_id, "Failed to apply message: {e}"),
                }
            }
        }
    };

    if evicted {
        let frame = CloseFrame {
            code: close_code::AGAIN,
            reason: REASON_EVICTED.to_owned().into(),
        };
        if close_tx.send(frame).is_ok()
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut send_task).await.is_err()
        {
            debug!(%session_id, %conn_id, "peer did not take the close frame in time");
        }
    }
    send_task.abort();
    // Dropping the attachment unregisters and announces the departure.
    drop(attachment);
}

/// Create the session router.
///
/// Mounts `POST /sessions`, `GET /sessions/{session_id}` and
/// `GET /ws/{session_id}`.
///
/// # Example
/// ```ignore
/// let hub = Arc::new(SessionHub::new(MemoryStore::new()));
/// let app = Router::new().merge(router(hub, TransportConfig::default()));
/// ```
#[must_use]
pub fn router<S>(hub: Arc<SessionHub<S>>, config: TransportConfig) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route("/sessions", post(api::create_session::<S>))
        .route("/sessions/{session_id}", get(api::get_session::<S>))
        .route("/ws/{session_id}", get(ws_handler::<S>))
        .with_state(AppState::new(hub, config))
}
