//! Session management for authentication

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::storage::KvStore;

/// Storage key for the persisted access token
pub(crate) const TOKEN_KEY: &str = "authToken";

/// Storage key for the persisted username
pub(crate) const USERNAME_KEY: &str = "username";

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The access token
    #[serde(rename = "access_token")]
    pub access_token: String,

    /// The username the token was issued for
    pub username: String,
}

impl Session {
    /// Create a new session
    pub fn new(access_token: String, username: String) -> Self {
        Self {
            access_token,
            username,
        }
    }
}

/// Shared owner of the current session.
///
/// Every part of the client reads authentication state through one
/// context. Changes are written through to the key-value store so a later
/// process start can pick the session back up.
#[derive(Clone)]
pub struct SessionContext {
    session: Arc<Mutex<Option<Session>>>,
    storage: Arc<dyn KvStore>,
}

impl SessionContext {
    /// Create a new context backed by the given store
    pub fn new(storage: Arc<dyn KvStore>) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            storage,
        }
    }

    /// Load a previously persisted session, if both halves are present
    pub fn restore(&self) -> Option<Session> {
        let token = self.storage.get(TOKEN_KEY)?;
        let username = self.storage.get(USERNAME_KEY)?;
        let session = Session::new(token, username);

        let mut current = self.session.lock().unwrap();
        *current = Some(session.clone());
        Some(session)
    }

    /// Install a fresh session and persist it
    pub fn establish(&self, session: Session) {
        self.storage.set(TOKEN_KEY, &session.access_token);
        self.storage.set(USERNAME_KEY, &session.username);

        let mut current = self.session.lock().unwrap();
        *current = Some(session);
    }

    /// Drop the session along with its persisted copy
    pub fn clear(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USERNAME_KEY);

        let mut current = self.session.lock().unwrap();
        *current = None;
    }

    /// Get the current session
    pub fn session(&self) -> Option<Session> {
        let current = self.session.lock().unwrap();
        current.clone()
    }

    /// Access token of the current session
    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    /// Username of the current session
    pub fn username(&self) -> Option<String> {
        self.session().map(|s| s.username)
    }

    /// Whether a session is currently established
    pub fn is_authenticated(&self) -> bool {
        let current = self.session.lock().unwrap();
        current.is_some()
    }
}
