use std::collections::HashMap;
use std::error;
use std::fmt;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use super::PeerSession;
use crate::models::PeerKey;

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A live session already uses this key. [key]
    AlreadyExists(PeerKey),
    /// No session for this key. [key]
    NotFound(PeerKey),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RegistryError::*;
        match self {
            AlreadyExists(key) => write!(f, "Session for {} already exists", key),
            NotFound(key) => write!(f, "No session for {}", key),
        }
    }
}

impl error::Error for RegistryError {}

/// Live sessions by peer key, at most one per key
///
/// The lock only guards the map; sessions are never touched while it is held.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<PeerKey, Arc<PeerSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session built by `factory` if the key is free
    /// The factory only runs once the key is known to be free
    pub async fn create<F>(&self, key: PeerKey, factory: F) -> Result<Arc<PeerSession>, RegistryError>
    where
        F: FnOnce() -> PeerSession,
    {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(RegistryError::AlreadyExists(key));
        }
        let session = Arc::new(factory());
        sessions.insert(key, Arc::clone(&session));
        debug!("[{}] Session registered ({} active)", key, sessions.len());
        Ok(session)
    }

    pub async fn lookup(&self, key: &PeerKey) -> Result<Arc<PeerSession>, RegistryError> {
        self.sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(RegistryError::NotFound(*key))
    }

    /// Remove a session, removing an absent key is a no-op
    /// Returns whether this call removed it
    pub async fn remove(&self, key: &PeerKey) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(key).is_some();
        if removed {
            debug!("[{}] Session removed ({} active)", key, sessions.len());
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
