pub mod session_events;

pub use session_events::{SessionEndReason, SessionEvent, SessionEvents};
