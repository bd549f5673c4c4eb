//! Session state types and the storage trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ConnectionId;

/// Code a freshly created session starts with.
pub const DEFAULT_CODE: &str = "# Write your code here\n";

/// Language a freshly created session starts with.
pub const DEFAULT_LANGUAGE: &str = "python";

/// Short opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Number of characters in a generated identifier.
    pub const LEN: usize = 8;

    /// Generate a fresh identifier from a random v4 UUID.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(Self::LEN);
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Shared session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Current document text (last write wins).
    pub code: String,
    /// Current language tag. Not validated.
    pub language: String,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
}

impl Session {
    /// Create a session holding the default document.
    #[must_use]
    pub fn new(id: SessionId, created_at: i64) -> Self {
        Self {
            id,
            code: DEFAULT_CODE.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            created_at,
        }
    }
}

/// Session state plus its live participant count, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub code: String,
    pub language: String,
    pub created_at: i64,
    pub participants: usize,
}

impl SessionInfo {
    #[must_use]
    pub fn new(session: Session, participants: usize) -> Self {
        Self {
            id: session.id,
            code: session.code,
            language: session.language,
            created_at: session.created_at,
            participants,
        }
    }
}

/// Session error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Connection not attached: {0}")]
    NotAttached(ConnectionId),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for session state backends.
///
/// Implementations only mutate; they never broadcast.
pub trait SessionStore: Send + Sync {
    /// Create a session with default contents and return its identifier.
    ///
    /// # Errors
    /// Returns error if the backend is unavailable.
    fn create(&self) -> Result<SessionId, SessionError>;

    /// Get a copy of a session.
    ///
    /// # Errors
    /// Returns `NotFound` if the identifier is absent.
    fn get(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// Overwrite the session's code.
    ///
    /// # Errors
    /// Returns `NotFound` if the identifier is absent.
    fn set_code(&self, id: &SessionId, code: String) -> Result<(), SessionError>;

    /// Overwrite the session's language. Any string is accepted.
    ///
    /// # Errors
    /// Returns `NotFound` if the identifier is absent.
    fn set_language(&self, id: &SessionId, language: String) -> Result<(), SessionError>;

    /// Whether a session with this identifier exists.
    ///
    /// The default clones the session through `get`; backends holding large
    /// documents should answer from their index instead.
    fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_ok()
    }
}
