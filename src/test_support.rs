//! Shared fixtures for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::api_clients::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

pub fn sample_user() -> User {
    User {
        id: 7,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::Student,
        bio: None,
        created_at: None,
        updated_at: None,
    }
}

/// Successful login/register/refresh body for `sample_user` with `token`.
pub fn auth_body(token: &str) -> String {
    serde_json::json!({
        "success": true,
        "data": {
            "token": token,
            "id": 7,
            "name": "Ada",
            "email": "ada@example.com",
            "role": "STUDENT"
        }
    })
    .to_string()
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(u16, String),
    NetworkFailure,
}

type Handler = Box<dyn Fn(&ApiRequest) -> Scripted + Send + Sync>;

/// Scripted transport keyed by request path.
///
/// Each path replays its queued outcomes in order and repeats the last one.
/// A path with a handler answers from the request instead (e.g. by bearer).
#[derive(Default)]
pub struct FakeTransport {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    handlers: Mutex<HashMap<String, std::sync::Arc<Handler>>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport").finish_non_exhaustive()
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.push(path, Scripted::Respond(status, body.to_string()));
    }

    pub fn fail_network(&self, path: &str) {
        self.push(path, Scripted::NetworkFailure);
    }

    /// Answer `path` with `ok_body` when the bearer is `accepted`, 401 otherwise.
    pub fn accept_bearer(&self, path: &str, accepted: &str, ok_body: &str) {
        let accepted = accepted.to_string();
        let ok_body = ok_body.to_string();
        let handler: Handler = Box::new(move |request: &ApiRequest| {
            if request.bearer.as_deref() == Some(accepted.as_str()) {
                Scripted::Respond(200, ok_body.clone())
            } else {
                Scripted::Respond(401, r#"{"success":false,"message":"Invalid token"}"#.to_string())
            }
        });
        self.handlers
            .lock()
            .unwrap()
            .insert(path.to_string(), std::sync::Arc::new(handler));
    }

    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn push(&self, path: &str, outcome: Scripted) {
        self.queues
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(outcome);
    }

    fn next_outcome(&self, request: &ApiRequest) -> Scripted {
        let handler = self.handlers.lock().unwrap().get(&request.path).cloned();
        if let Some(handler) = handler {
            return (**handler)(request);
        }
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(&request.path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Scripted::Respond(404, r#"{"success":false,"message":"Not found"}"#.to_string()),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = self.delays.lock().unwrap().get(&request.path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_outcome(request) {
            Scripted::Respond(status, body) => Ok(ApiResponse::new(status, body)),
            Scripted::NetworkFailure => Err(AppError::NetworkError(format!(
                "{} {} timed out",
                request.method, request.path
            ))),
        }
    }
}
