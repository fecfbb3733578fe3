use log::{debug, info, warn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

use super::secure_storage_trait::SecureStorage;
use crate::constants::{TOKEN_KEY, USER_KEY};
use crate::models::{Session, User};

/// Process-wide holder of the bearer token and cached user profile.
///
/// Token and user are always written together, so `user` is never set
/// without `token`. Reads are synchronous snapshots of the in-memory pair.
/// Writes update memory first and then persist to the storage backend; they
/// are serialized so the backend sees them in the same order as memory.
#[derive(Debug)]
pub struct TokenManager {
    state: RwLock<Session>,
    write_lock: Mutex<()>,
    secure_backend: Arc<dyn SecureStorage>,
}

impl TokenManager {
    pub fn new(secure_backend: Arc<dyn SecureStorage>) -> Self {
        Self {
            state: RwLock::new(Session::empty()),
            write_lock: Mutex::new(()),
            secure_backend,
        }
    }

    /// Seed the in-memory session from persistent storage.
    ///
    /// A token without a user (or the reverse), or a user that no longer
    /// parses, is discarded as a whole.
    pub async fn load(&self) -> Session {
        let _guard = self.write_lock.lock().await;

        let token = match self.secure_backend.get_item(TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!("TokenManager: Failed to read token from storage: {}. Starting signed out.", e);
                None
            }
        };
        let user_json = match self.secure_backend.get_item(USER_KEY).await {
            Ok(user) => user,
            Err(e) => {
                warn!("TokenManager: Failed to read user from storage: {}. Starting signed out.", e);
                None
            }
        };

        let user = user_json.as_deref().and_then(|raw| match serde_json::from_str::<User>(raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("TokenManager: Stored user profile is unreadable: {}", e);
                None
            }
        });

        let session = match (token, user) {
            (Some(token), Some(user)) => {
                info!("TokenManager: Restored session for user {}", user.id);
                Session {
                    token: Some(token),
                    user: Some(user),
                }
            }
            (None, None) if user_json.is_none() => {
                debug!("TokenManager: No persisted session");
                Session::empty()
            }
            _ => {
                warn!("TokenManager: Discarding incomplete persisted session");
                self.remove_persisted().await;
                Session::empty()
            }
        };

        *self.write_state() = session.clone();
        session
    }

    pub fn snapshot(&self) -> Session {
        self.read_state().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read_state().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read_state().user.clone()
    }

    /// Replace the whole session (login, register).
    pub async fn set_session(&self, token: String, user: User) {
        let _guard = self.write_lock.lock().await;
        {
            let mut state = self.write_state();
            state.token = Some(token.clone());
            state.user = Some(user.clone());
        }
        self.persist_session(&token, &user).await;
    }

    /// Store a refreshed pair only while `expected` is still the stored token.
    ///
    /// Returns false, leaving the store untouched, when the session was
    /// cleared or replaced after the refresh started.
    pub async fn replace_if_current(&self, expected: &str, token: String, user: User) -> bool {
        let _guard = self.write_lock.lock().await;
        {
            let mut state = self.write_state();
            if state.token.as_deref() != Some(expected) {
                debug!("TokenManager: Stored token changed, dropping refreshed session");
                return false;
            }
            state.token = Some(token.clone());
            state.user = Some(user.clone());
        }
        self.persist_session(&token, &user).await;
        true
    }

    async fn persist_session(&self, token: &str, user: &User) {
        if let Err(e) = self.secure_backend.set_item(TOKEN_KEY, token).await {
            warn!("TokenManager: Failed to persist token: {}. Token only stored in memory.", e);
        }
        match serde_json::to_string(user) {
            Ok(json) => {
                if let Err(e) = self.secure_backend.set_item(USER_KEY, &json).await {
                    warn!("TokenManager: Failed to persist user: {}. User only stored in memory.", e);
                }
            }
            Err(e) => warn!("TokenManager: Failed to serialize user: {}", e),
        }
        debug!("TokenManager: Session stored for user {}", user.id);
    }

    /// Replace the cached profile of the current session. Ignored when
    /// signed out, since a user must never exist without a token.
    pub async fn update_user(&self, user: User) -> bool {
        let _guard = self.write_lock.lock().await;
        {
            let mut state = self.write_state();
            if state.token.is_none() {
                debug!("TokenManager: Ignoring profile update without a session");
                return false;
            }
            state.user = Some(user.clone());
        }
        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(e) = self.secure_backend.set_item(USER_KEY, &json).await {
                    warn!("TokenManager: Failed to persist user: {}", e);
                }
            }
            Err(e) => warn!("TokenManager: Failed to serialize user: {}", e),
        }
        true
    }

    /// Clear token and user together. Returns whether a session existed.
    pub async fn clear(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        self.clear_locked().await
    }

    /// Clear the session only if `expected` is still the stored token.
    pub async fn clear_if_current(&self, expected: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        if self.read_state().token.as_deref() != Some(expected) {
            return false;
        }
        self.clear_locked().await
    }

    async fn clear_locked(&self) -> bool {
        let had_session = {
            let mut state = self.write_state();
            let had = state.token.is_some() || state.user.is_some();
            *state = Session::empty();
            had
        };
        self.remove_persisted().await;
        if had_session {
            info!("TokenManager: Session cleared");
        }
        had_session
    }

    async fn remove_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.secure_backend.remove_item(key).await {
                warn!("TokenManager: Failed to remove '{}' from storage: {}", key, e);
            }
        }
    }

    // The guarded value is a plain pair that is always written in one step,
    // so a poisoned lock still holds a consistent session.
    fn read_state(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
