//! Client-side session handling for the SkillUp course marketplace API.
//!
//! [`services::SessionManager`] is the entry point. It owns the token store,
//! the single-flight refresh coordinator and the authenticated
//! [`api_clients::SessionClient`] that feature code sends requests through.

pub mod api_clients;
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api_clients::{ApiRequest, ApiResponse, HttpTransport, SessionClient};
pub use config::{ClientConfig, StorageBackend};
pub use error::{AppError, AppResult, SerializableError};
pub use events::{SessionEndReason, SessionEvent};
pub use models::{LoginCredentials, RegisterData, Role, Session, User};
pub use services::{SessionManager, SessionPhase};
