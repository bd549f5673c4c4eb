//! In-memory session storage.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use codepair_core::{Session, SessionError, SessionId, SessionStore};

/// In-memory storage implementation.
///
/// Sessions live for the lifetime of the process and are never evicted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a session half-written:
    // every update is a single field assignment.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(
        &self,
        id: &SessionId,
        apply: impl FnOnce(&mut Session),
    ) -> Result<(), SessionError> {
        let mut sessions = self.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        apply(session);

        Ok(())
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().try_into().unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl SessionStore for MemoryStore {
    fn create(&self) -> Result<SessionId, SessionError> {
        let mut sessions = self.write();

        // Eight hex characters leave room for the odd collision; draw again.
        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        sessions.insert(id.clone(), Session::new(id.clone(), now()));

        Ok(id)
    }

    fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    fn contains(&self, id: &SessionId) -> bool {
        self.read().contains_key(id)
    }

    fn set_code(&self, id: &SessionId, code: String) -> Result<(), SessionError> {
        self.update(id, |session| session.code = code)
    }

    fn set_language(&self, id: &SessionId, language: String) -> Result<(), SessionError> {
        self.update(id, |session| session.language = language)
    }
}
