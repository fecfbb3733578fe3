use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::constants::SESSION_EVENT_CHANNEL_CAPACITY;
use crate::models::User;

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The refresh endpoint rejected the token or could not be reached.
    RefreshFailed,
    /// A request was still rejected with 401 after a refreshed retry.
    Unauthorized,
    /// The persisted session failed validation at startup.
    InvalidAtStartup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    SignedIn { user: User, at: DateTime<Utc> },
    Refreshed { user: User, at: DateTime<Utc> },
    SignedOut { at: DateTime<Utc> },
    /// Irrecoverable auth failure; the UI should navigate to its login view.
    SessionEnded { reason: SessionEndReason, at: DateTime<Utc> },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "signed-in",
            SessionEvent::Refreshed { .. } => "refreshed",
            SessionEvent::SignedOut { .. } => "signed-out",
            SessionEvent::SessionEnded { .. } => "session-ended",
        }
    }
}

/// Broadcast hub for session lifecycle events.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SESSION_EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published {} to {} subscriber(s)", event_type, receivers),
            Err(_) => debug!("Published {} with no subscribers", event_type),
        }
    }

    pub fn signed_in(&self, user: User) {
        self.publish(SessionEvent::SignedIn { user, at: Utc::now() });
    }

    pub fn refreshed(&self, user: User) {
        self.publish(SessionEvent::Refreshed { user, at: Utc::now() });
    }

    pub fn signed_out(&self) {
        self.publish(SessionEvent::SignedOut { at: Utc::now() });
    }

    pub fn session_ended(&self, reason: SessionEndReason) {
        self.publish(SessionEvent::SessionEnded { reason, at: Utc::now() });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
