use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::instrument;

use crate::api_clients::auth_client::AuthApiClient;
use crate::api_clients::session_client::SessionClient;
use crate::api_clients::transport::{HttpTransport, ReqwestTransport};
use crate::auth::file_storage::FileStorage;
use crate::auth::keyring_storage::KeyringStorage;
use crate::auth::memory_storage::MemoryStorage;
use crate::auth::secure_storage_trait::SecureStorage;
use crate::auth::session_teardown::SessionTeardown;
use crate::auth::token_introspection;
use crate::auth::token_manager::TokenManager;
use crate::auth::token_refresh::RefreshCoordinator;
use crate::config::{ClientConfig, StorageBackend};
use crate::constants::{SERVICE_NAME_FOR_KEYRING, VALIDATE_PATH};
use crate::error::{AppError, AppResult};
use crate::events::{SessionEndReason, SessionEvent, SessionEvents};
use crate::models::{LoginCredentials, RegisterData, Session, User, ValidateResponse};

/// Lifecycle state of the stored session.
///
/// A stored token that has already expired still counts as `Authenticated`
/// until the session is explicitly ended; the next request refreshes it. Use
/// [`Session::is_authenticated`] to ask whether the token is usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated,
    Refreshing,
}

/// Create the storage backend selected by configuration.
pub fn create_secure_storage(config: &ClientConfig) -> AppResult<Arc<dyn SecureStorage>> {
    let storage: Arc<dyn SecureStorage> = match config.storage_backend {
        StorageBackend::File => Arc::new(FileStorage::new(config.resolved_storage_dir()?)),
        StorageBackend::Keyring => Arc::new(KeyringStorage::new(SERVICE_NAME_FOR_KEYRING)),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    debug!("Session storage backend: {:?}", storage);
    Ok(storage)
}

/// Owns the session lifecycle: sign-in and sign-out, startup validation and
/// proactive refresh.
#[derive(Debug)]
pub struct SessionManager {
    config: ClientConfig,
    token_manager: Arc<TokenManager>,
    events: SessionEvents,
    teardown: SessionTeardown,
    coordinator: Arc<RefreshCoordinator>,
    auth_client: AuthApiClient,
    client: SessionClient,
    visibility: Arc<Notify>,
}

impl SessionManager {
    /// Wire up a manager against the real API and the configured storage.
    pub fn build(config: ClientConfig) -> AppResult<Self> {
        config.validate()?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            config.base_url.clone(),
            config.request_timeout,
        )?);
        let storage = create_secure_storage(&config)?;
        Ok(Self::with_parts(config, transport, storage))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn SecureStorage>,
    ) -> Self {
        let token_manager = Arc::new(TokenManager::new(storage));
        let events = SessionEvents::new();
        let teardown = SessionTeardown::new(Arc::clone(&token_manager), events.clone());
        let auth_client = AuthApiClient::new(Arc::clone(&transport));
        let coordinator = Arc::new(RefreshCoordinator::new(
            auth_client.clone(),
            Arc::clone(&token_manager),
            teardown.clone(),
            events.clone(),
        ));
        let client = SessionClient::new(
            transport,
            Arc::clone(&token_manager),
            Arc::clone(&coordinator),
            teardown.clone(),
            config.retry_policy.clone(),
        );

        Self {
            config,
            token_manager,
            events,
            teardown,
            coordinator,
            auth_client,
            client,
            visibility: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authenticated API client for feature code.
    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn session(&self) -> Session {
        self.token_manager.snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.coordinator.is_refreshing() {
            return SessionPhase::Refreshing;
        }
        let session = self.token_manager.snapshot();
        if session.token.is_some() && session.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Seed the in-memory session from persistent storage.
    pub async fn restore(&self) -> Session {
        self.token_manager.load().await
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> AppResult<User> {
        let (token, user) = self.auth_client.login(credentials).await?;
        self.start_session(token, user).await
    }

    pub async fn register(&self, data: &RegisterData) -> AppResult<User> {
        let (token, user) = self.auth_client.register(data).await?;
        self.start_session(token, user).await
    }

    async fn start_session(&self, token: String, user: User) -> AppResult<User> {
        self.token_manager.set_session(token, user.clone()).await;
        self.events.signed_in(user.clone());
        Ok(user)
    }

    /// Clear the session. Returns whether one existed.
    pub async fn logout(&self) -> bool {
        let cleared = self.token_manager.clear().await;
        if cleared {
            info!("Signed out");
            self.events.signed_out();
        }
        cleared
    }

    /// Check a restored session against the server.
    ///
    /// A missing, partial or expired session is cleared without a round trip.
    /// A connectivity failure keeps the session, since the credential may
    /// still be valid; any other failure ends it.
    pub async fn validate_on_load(&self) -> SessionPhase {
        let session = self.token_manager.snapshot();
        if !session.is_authenticated_at(Utc::now()) {
            if session.has_token() {
                info!("Persisted session is expired or unreadable");
                self.teardown
                    .end_session(SessionEndReason::InvalidAtStartup)
                    .await;
            }
            return self.phase();
        }

        match self.client.get_json::<ValidateResponse>(VALIDATE_PATH).await {
            Ok(ValidateResponse { valid: true, user }) => {
                if let Some(user) = user {
                    self.token_manager.update_user(user).await;
                }
                info!("Persisted session validated");
            }
            Ok(ValidateResponse { valid: false, .. }) => {
                warn!("Server reports the persisted session as invalid");
                self.teardown
                    .end_session(SessionEndReason::InvalidAtStartup)
                    .await;
            }
            Err(e) if e.is_connectivity() => {
                warn!("Could not validate session, keeping it: {}", e);
            }
            Err(e) => {
                warn!("Session validation failed: {}", e);
                self.teardown
                    .end_session(SessionEndReason::InvalidAtStartup)
                    .await;
            }
        }
        self.phase()
    }

    /// Refresh when the token's remaining lifetime is positive but below the
    /// warning threshold. Expired tokens are left to the request pipeline.
    pub async fn refresh_if_needed(&self) -> AppResult<bool> {
        let session = self.token_manager.snapshot();
        let (Some(token), Some(_)) = (session.token.as_deref(), session.user.as_ref()) else {
            return Ok(false);
        };

        let threshold = chrono::Duration::from_std(self.config.warning_threshold)
            .map_err(|e| AppError::ConfigError(format!("Invalid warning threshold: {}", e)))?;
        let now = Utc::now();
        if !token_introspection::needs_proactive_refresh(token, threshold, now) {
            return Ok(false);
        }

        if let Some(remaining) = token_introspection::time_until_expiry(token, now) {
            info!(
                "Token expires in {}s, refreshing proactively",
                remaining.num_seconds()
            );
        }
        self.coordinator.refresh().await?;
        Ok(true)
    }

    /// Report a foreground/background change. Becoming visible runs the same
    /// check as the periodic timer; bursts coalesce into one check.
    pub fn notify_visibility(&self, visible: bool) {
        if visible {
            self.visibility.notify_one();
        }
    }

    /// Spawn the periodic and visibility-driven refresh loop.
    pub fn start_monitor(self: &Arc<Self>) -> SessionMonitorHandle {
        let shutdown = Arc::new(Notify::new());
        let manager = Arc::clone(self);
        let stop = Arc::clone(&shutdown);
        let task = tokio::spawn(async move { manager.run_monitor(stop).await });
        SessionMonitorHandle { shutdown, task }
    }

    #[instrument(skip_all)]
    async fn run_monitor(&self, shutdown: Arc<Notify>) {
        let period = self.config.refresh_interval;
        info!("Starting session monitor, checking every {:?}", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = ticker.tick() => self.run_refresh_check("interval").await,
                _ = self.visibility.notified() => self.run_refresh_check("visibility").await,
            }
        }
        info!("Session monitor stopped");
    }

    async fn run_refresh_check(&self, trigger: &str) {
        match self.refresh_if_needed().await {
            Ok(true) => debug!("Proactive refresh ({}) completed", trigger),
            Ok(false) => debug!("Proactive refresh ({}) not needed", trigger),
            Err(e) => warn!("Proactive refresh ({}) failed: {}", trigger, e),
        }
    }
}

#[derive(Debug)]
pub struct SessionMonitorHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SessionMonitorHandle {
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!("Session monitor task ended abnormally: {}", e);
        }
    }
}
