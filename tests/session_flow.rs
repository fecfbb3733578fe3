use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skillup_session::api_clients::ReqwestTransport;
use skillup_session::auth::{MemoryStorage, SecureStorage};
use skillup_session::constants::{REFRESH_PATH, TOKEN_KEY, USER_KEY};
use skillup_session::{
    ApiRequest, ApiResponse, AppError, AppResult, ClientConfig, HttpTransport, SessionEndReason,
    SessionEvent, SessionManager, SessionPhase, StorageBackend,
};

const COURSES: &str = "/api/courses";

fn token(lifetime: ChronoDuration, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = (Utc::now() + lifetime).timestamp();
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "sub": "7", "jti": tag }).to_string());
    format!("{}.{}.sig", header, payload)
}

fn auth_body(token: &str) -> String {
    json!({
        "success": true,
        "data": { "token": token, "id": 7, "name": "Ada", "email": "ada@example.com", "role": "STUDENT" }
    })
    .to_string()
}

fn user_json() -> String {
    json!({ "id": 7, "name": "Ada", "email": "ada@example.com", "role": "STUDENT" }).to_string()
}

type Route = Box<dyn Fn(&ApiRequest) -> AppResult<ApiResponse> + Send + Sync>;

/// Transport answering from a single routing closure and recording requests.
struct ScriptedServer {
    route: Route,
    refresh_delay: Duration,
    requests: Mutex<Vec<ApiRequest>>,
}

impl std::fmt::Debug for ScriptedServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScriptedServer")
    }
}

impl ScriptedServer {
    fn new(route: Route) -> Arc<Self> {
        Arc::new(Self {
            route,
            refresh_delay: Duration::from_millis(40),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls_to(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedServer {
    async fn execute(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if request.path == REFRESH_PATH {
            tokio::time::sleep(self.refresh_delay).await;
        }
        (self.route)(request)
    }
}

async fn signed_in_manager(
    server: Arc<ScriptedServer>,
    current_token: &str,
) -> (Arc<SessionManager>, MemoryStorage) {
    let storage = MemoryStorage::new();
    storage.set_item(TOKEN_KEY, current_token).await.unwrap();
    storage.set_item(USER_KEY, &user_json()).await.unwrap();

    let config = ClientConfig {
        storage_backend: StorageBackend::Memory,
        ..ClientConfig::default()
    };
    let manager = SessionManager::with_parts(config, server, Arc::new(storage.clone()));
    manager.restore().await;
    (Arc::new(manager), storage)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn ended_count(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::SessionEnded { .. }))
        .count()
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_once_for_concurrent_checks() {
    let renewed = token(ChronoDuration::hours(1), "renewed");
    let body = auth_body(&renewed);
    let server = ScriptedServer::new(Box::new(move |_: &ApiRequest| Ok(ApiResponse::new(200, body.clone()))));
    let (manager, storage) =
        signed_in_manager(server.clone(), &token(ChronoDuration::minutes(1), "old")).await;

    let (a, b, c) = tokio::join!(
        manager.refresh_if_needed(),
        manager.refresh_if_needed(),
        manager.refresh_if_needed()
    );
    assert!(a.unwrap() && b.unwrap() && c.unwrap());
    assert_eq!(server.calls_to(REFRESH_PATH), 1);
    assert_eq!(storage.get_item(TOKEN_KEY).await.unwrap(), Some(renewed));
}

#[tokio::test]
async fn resource_401_is_replayed_with_refreshed_token() {
    let renewed = token(ChronoDuration::hours(1), "renewed");
    let accepted = format!("Bearer {}", renewed);
    let refresh_body = auth_body(&renewed);
    let server = ScriptedServer::new(Box::new(move |request: &ApiRequest| {
        if request.path == REFRESH_PATH {
            return Ok(ApiResponse::new(200, refresh_body.clone()));
        }
        let bearer = request.bearer.as_ref().map(|t| format!("Bearer {}", t));
        if bearer.as_deref() == Some(accepted.as_str()) {
            Ok(ApiResponse::new(200, r#"{"success":true,"data":{"title":"X"}}"#))
        } else {
            Ok(ApiResponse::new(401, r#"{"success":false,"message":"jwt expired"}"#))
        }
    }));
    let (manager, _) =
        signed_in_manager(server.clone(), &token(ChronoDuration::minutes(30), "old")).await;

    let course: Value = manager.client().get_json(COURSES).await.unwrap();
    assert_eq!(course["title"], "X");
    assert_eq!(server.calls_to(COURSES), 2);
    assert_eq!(server.calls_to(REFRESH_PATH), 1);
    assert_eq!(manager.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn repeated_401_ends_the_session_exactly_once() {
    let renewed = token(ChronoDuration::hours(1), "renewed");
    let refresh_body = auth_body(&renewed);
    let server = ScriptedServer::new(Box::new(move |request: &ApiRequest| {
        if request.path == REFRESH_PATH {
            Ok(ApiResponse::new(200, refresh_body.clone()))
        } else {
            Ok(ApiResponse::new(401, r#"{"success":false,"message":"jwt rejected"}"#))
        }
    }));
    let (manager, storage) =
        signed_in_manager(server.clone(), &token(ChronoDuration::minutes(30), "old")).await;
    let mut rx = manager.subscribe();

    let err = manager.client().send(ApiRequest::get(COURSES)).await.unwrap_err();
    assert_eq!(err, AppError::AuthExpiredError("jwt rejected".to_string()));
    assert_eq!(server.calls_to(COURSES), 2);
    assert!(storage.is_empty());
    assert_eq!(manager.phase(), SessionPhase::Unauthenticated);

    // Ending an already-ended session is a no-op.
    assert!(!manager.logout().await);
    assert_eq!(ended_count(&drain(&mut rx)), 1);
}

#[tokio::test]
async fn refresh_timeout_fails_every_waiter_and_clears_once() {
    let server = ScriptedServer::new(Box::new(|request: &ApiRequest| {
        Err(AppError::NetworkError(format!("{} timed out", request.path)))
    }));
    let (manager, storage) =
        signed_in_manager(server.clone(), &token(ChronoDuration::minutes(1), "old")).await;
    let mut rx = manager.subscribe();

    let (a, b, c) = tokio::join!(
        manager.refresh_if_needed(),
        manager.refresh_if_needed(),
        manager.refresh_if_needed()
    );
    let a = a.unwrap_err();
    assert!(matches!(a, AppError::RefreshError(_)));
    assert!(a.is_session_ended());
    assert_eq!(b.unwrap_err(), a);
    assert_eq!(c.unwrap_err(), a);
    assert_eq!(server.calls_to(REFRESH_PATH), 1);
    assert!(storage.is_empty());

    let events = drain(&mut rx);
    assert_eq!(ended_count(&events), 1);
    assert!(matches!(
        events[0],
        SessionEvent::SessionEnded {
            reason: SessionEndReason::RefreshFailed,
            ..
        }
    ));
}

#[tokio::test]
async fn forbidden_response_leaves_session_alone() {
    let server = ScriptedServer::new(Box::new(|_: &ApiRequest| {
        Ok(ApiResponse::new(403, r#"{"success":false,"message":"Instructor role required"}"#))
    }));
    let current = token(ChronoDuration::minutes(30), "old");
    let (manager, storage) = signed_in_manager(server.clone(), &current).await;
    let mut rx = manager.subscribe();

    let err = manager
        .client()
        .post_json::<_, Value>(COURSES, &json!({ "title": "Rust" }))
        .await
        .unwrap_err();
    assert_eq!(err, AppError::AccessDenied("Instructor role required".to_string()));
    assert_eq!(storage.get_item(TOKEN_KEY).await.unwrap(), Some(current));
    assert_eq!(server.calls_to(REFRESH_PATH), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn refresh_and_replay_over_http() {
    let old = token(ChronoDuration::minutes(30), "old");
    let renewed = token(ChronoDuration::hours(1), "renewed");

    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", COURSES)
        .match_header("authorization", format!("Bearer {}", old).as_str())
        .with_status(401)
        .with_body(r#"{"success":false,"message":"jwt expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .match_header("authorization", format!("Bearer {}", old).as_str())
        .with_status(200)
        .with_body(auth_body(&renewed))
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", COURSES)
        .match_header("authorization", format!("Bearer {}", renewed).as_str())
        .with_status(200)
        .with_body(r#"{"success":true,"data":[{"title":"X"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let storage = MemoryStorage::new();
    storage.set_item(TOKEN_KEY, &old).await.unwrap();
    storage.set_item(USER_KEY, &user_json()).await.unwrap();
    let config = ClientConfig {
        base_url: server.url(),
        storage_backend: StorageBackend::Memory,
        ..ClientConfig::default()
    };
    let transport = ReqwestTransport::new(config.base_url.clone(), config.request_timeout).unwrap();
    let manager = SessionManager::with_parts(config, Arc::new(transport), Arc::new(storage.clone()));
    manager.restore().await;

    let courses: Vec<Value> = manager.client().get_json(COURSES).await.unwrap();
    assert_eq!(courses[0]["title"], "X");
    assert_eq!(storage.get_item(TOKEN_KEY).await.unwrap(), Some(renewed));

    rejected.assert_async().await;
    refresh.assert_async().await;
    accepted.assert_async().await;
}
