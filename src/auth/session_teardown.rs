use log::{debug, warn};
use std::sync::Arc;

use super::token_manager::TokenManager;
use crate::events::{SessionEndReason, SessionEvents};

/// The only path by which an unrecoverable auth failure ends the session.
///
/// Clears the token store and emits `SessionEnded`. Ending a session that is
/// already gone does nothing, so the event fires at most once per session.
#[derive(Debug, Clone)]
pub struct SessionTeardown {
    token_manager: Arc<TokenManager>,
    events: SessionEvents,
}

impl SessionTeardown {
    pub fn new(token_manager: Arc<TokenManager>, events: SessionEvents) -> Self {
        Self {
            token_manager,
            events,
        }
    }

    /// Returns whether a session was actually ended.
    pub async fn end_session(&self, reason: SessionEndReason) -> bool {
        let cleared = self.token_manager.clear().await;
        self.report(cleared, reason)
    }

    /// End the session only if it still holds `token`. A session created
    /// after `token` was read is left alone.
    pub async fn end_session_for(&self, token: &str, reason: SessionEndReason) -> bool {
        let cleared = self.token_manager.clear_if_current(token).await;
        self.report(cleared, reason)
    }

    fn report(&self, cleared: bool, reason: SessionEndReason) -> bool {
        if cleared {
            warn!("Session ended: {:?}", reason);
            self.events.session_ended(reason);
        } else {
            debug!("Session already ended or replaced, ignoring {:?}", reason);
        }
        cleared
    }
}
