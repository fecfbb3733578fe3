//! Navigation decisions for a UI router.
//!
//! Decisions use the cached profile only. They steer navigation and are not
//! access control; the server enforces roles on every call.

use serde::Serialize;

use crate::models::{Role, Session};

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RouteDecision {
    Allow,
    /// Send the user to the login view, remembering where they were going.
    RedirectToLogin { from: String },
    Redirect { to: String },
}

/// Dashboard for a role.
pub fn home_route(role: Role) -> &'static str {
    match role {
        Role::Student => "/student/dashboard",
        Role::Instructor => "/instructor/dashboard",
        Role::Admin => "/admin/dashboard",
        Role::Unknown => "/",
    }
}

/// Decide whether `session` may open `path`.
///
/// An empty `allowed_roles` admits any signed-in user. A user with the
/// wrong role is sent to their own dashboard.
pub fn evaluate(session: &Session, path: &str, allowed_roles: &[Role]) -> RouteDecision {
    let user = match &session.user {
        Some(user) if session.is_authenticated() => user,
        _ => {
            return RouteDecision::RedirectToLogin {
                from: path.to_string(),
            };
        }
    };

    if allowed_roles.is_empty() || allowed_roles.contains(&user.role) {
        RouteDecision::Allow
    } else {
        RouteDecision::Redirect {
            to: home_route(user.role).to_string(),
        }
    }
}

/// Landing route after sign-in or at the application root.
pub fn landing_route(session: &Session) -> &'static str {
    match &session.user {
        Some(user) if session.is_authenticated() => home_route(user.role),
        _ => LOGIN_ROUTE,
    }
}
