//! Session storage
//!
//! `SessionStore` is the injectable keyed store; `InMemorySessionStore` keeps
//! sessions for the life of the process with no expiry. Each stored session
//! sits behind a [`SessionHandle`] carrying two locks: a data lock held only
//! for short reads and writes, and a single-flight lock that a mutating
//! operation holds for its whole duration (including a full upstream stream).
//! Readers never wait on an in-flight operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use super::{Session, SessionError};

/// Shared reference to one stored session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    session: Arc<RwLock<Session>>,
    flight: Arc<Mutex<()>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            id: session.id.clone(),
            session: Arc::new(RwLock::new(session)),
            flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Claim the single-flight slot without waiting
    ///
    /// Fails with `Busy` if another operation on this session is running.
    pub fn try_begin(&self) -> Result<Flight, SessionError> {
        debug!(id = %self.id, "SessionHandle::try_begin: called");
        match self.flight.clone().try_lock_owned() {
            Ok(permit) => Ok(Flight {
                _permit: permit,
                session: self.session.clone(),
            }),
            Err(_) => {
                debug!(id = %self.id, "SessionHandle::try_begin: busy");
                Err(SessionError::Busy(self.id.clone()))
            }
        }
    }

    /// Consistent copy of the session's current data
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }
}

/// Exclusive right to mutate a session, released on drop
#[derive(Debug)]
pub struct Flight {
    _permit: OwnedMutexGuard<()>,
    session: Arc<RwLock<Session>>,
}

impl Flight {
    pub async fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().await
    }
}

/// Keyed session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session, replacing any with the same id
    async fn insert(&self, session: Session) -> SessionHandle;

    async fn get(&self, id: &str) -> Option<SessionHandle>;

    /// Remove a session; in-flight operations keep their own handle
    async fn remove(&self, id: &str) -> Option<SessionHandle>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-lifetime map from session id to session
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> SessionHandle {
        let handle = SessionHandle::new(session);
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.id.clone(), handle.clone());
        info!(id = %handle.id, total = sessions.len(), "Stored session");
        handle
    }

    async fn get(&self, id: &str) -> Option<SessionHandle> {
        debug!(%id, "InMemorySessionStore::get: called");
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            info!(%id, "Removed session");
        } else {
            debug!(%id, "InMemorySessionStore::remove: not found");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
