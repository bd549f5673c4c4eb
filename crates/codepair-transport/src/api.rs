//! HTTP session lifecycle routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codepair_core::{SessionError, SessionId, SessionInfo, SessionStore};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::websocket::AppState;

/// Response body of `POST /sessions`.
#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub session_id: SessionId,
    pub session: SessionInfo,
}

/// Session error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "Session not found"),
            other => {
                error!("Session request failed: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// `POST /sessions`
///
/// # Errors
/// Returns 500 if the store fails.
pub async fn create_session<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<CreatedSession>, ApiError>
where
    S: SessionStore + 'static,
{
    let session_id = state.hub.create_session()?;
    let session = state.hub.session_info(&session_id)?;
    Ok(Json(CreatedSession {
        session_id,
        session,
    }))
}

/// `GET /sessions/{session_id}`
///
/// # Errors
/// Returns 404 if the session does not exist.
pub async fn get_session<S>(
    Path(session_id): Path<String>,
    State(state): State<AppState<S>>,
) -> Result<Json<SessionInfo>, ApiError>
where
    S: SessionStore + 'static,
{
    Ok(Json(state.hub.session_info(&SessionId::from(session_id))?))
}
