use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::token_introspection;

/// Marketplace role as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Instructor => "INSTRUCTOR",
            Role::Admin => "ADMIN",
            Role::Unknown => "UNKNOWN",
        }
    }
}

/// Cached user profile. It is denormalized for display and may be stale
/// relative to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Read model of the client's current authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn empty() -> Self {
        Self {
            token: None,
            user: None,
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// True iff both token and user are present and the token has not expired at `now`.
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, &self.user) {
            (Some(token), Some(_)) => !token_introspection::is_expired(token, now),
            _ => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }
}

/// Response envelope used by every SkillUp endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Token-bearing payload of login, register and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDataResponse {
    pub token: String,
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AuthDataResponse {
    pub fn into_parts(self) -> (String, User) {
        let user = User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            bio: None,
            created_at: None,
            updated_at: None,
        };
        (self.token, user)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_user_round_trips_camel_case() {
        let user: User = serde_json::from_value(json!({
            "id": 7,
            "name": "Ada",
            "email": "ada@example.com",
            "role": "INSTRUCTOR",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Instructor);
        assert_eq!(user.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00Z");
        assert!(value.get("bio").is_none());
    }

    #[test]
    fn test_unknown_role_does_not_fail() {
        let user: User = serde_json::from_value(json!({
            "id": 1, "name": "x", "email": "x@y", "role": "MODERATOR"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Unknown);
    }

    #[test]
    fn test_failure_envelope_without_data() {
        let envelope: ApiEnvelope<AuthDataResponse> =
            serde_json::from_value(json!({ "success": false, "message": "Invalid credentials" }))
                .unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_session_requires_token_and_user() {
        let session = Session {
            token: Some("not-a-jwt".to_string()),
            user: None,
        };
        assert!(!session.is_authenticated());
        assert!(!Session::empty().is_authenticated());
    }
}
