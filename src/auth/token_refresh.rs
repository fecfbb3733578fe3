use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::session_teardown::SessionTeardown;
use super::token_manager::TokenManager;
use crate::api_clients::auth_client::AuthApiClient;
use crate::error::{AppError, AppResult};
use crate::events::{SessionEndReason, SessionEvents};

type SharedRefresh = Shared<BoxFuture<'static, AppResult<String>>>;

struct PendingRefresh {
    generation: u64,
    outcome: SharedRefresh,
}

impl fmt::Debug for PendingRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRefresh")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

type PendingSlot = Arc<Mutex<Option<PendingRefresh>>>;

/// Single-flight token refresh.
///
/// Concurrent callers share one remote refresh call and receive the same
/// result. The pending slot is checked and filled under a synchronous lock
/// with no await in between, and the remote call runs on its own task so a
/// cancelled caller cannot strand the other waiters.
#[derive(Debug)]
pub struct RefreshCoordinator {
    auth_client: AuthApiClient,
    token_manager: Arc<TokenManager>,
    teardown: SessionTeardown,
    events: SessionEvents,
    pending: PendingSlot,
    next_generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        auth_client: AuthApiClient,
        token_manager: Arc<TokenManager>,
        teardown: SessionTeardown,
        events: SessionEvents,
    ) -> Self {
        Self {
            auth_client,
            token_manager,
            teardown,
            events,
            pending: Arc::new(Mutex::new(None)),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Refresh the stored token, joining an in-flight refresh if there is one.
    ///
    /// On failure the session has already been torn down and every waiter
    /// gets the same `RefreshError`.
    pub async fn refresh(&self) -> AppResult<String> {
        let outcome = {
            let mut slot = lock_slot(&self.pending);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight token refresh #{}", pending.generation);
                    pending.outcome.clone()
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Starting token refresh #{}", generation);
                    let outcome = self.start(generation);
                    *slot = Some(PendingRefresh {
                        generation,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };
        outcome.await
    }

    pub fn is_refreshing(&self) -> bool {
        lock_slot(&self.pending).is_some()
    }

    fn start(&self, generation: u64) -> SharedRefresh {
        let auth_client = self.auth_client.clone();
        let token_manager = Arc::clone(&self.token_manager);
        let teardown = self.teardown.clone();
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);

        let task = tokio::spawn(async move {
            perform_refresh(&auth_client, &token_manager, &teardown, &events).await
        });

        async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Token refresh task #{} did not complete: {}", generation, e);
                    Err(AppError::RefreshError(format!("Refresh task failed: {}", e)))
                }
            };
            // The store is already updated; later callers start a new refresh.
            {
                let mut slot = lock_slot(&pending);
                if slot.as_ref().is_some_and(|p| p.generation == generation) {
                    *slot = None;
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

async fn perform_refresh(
    auth_client: &AuthApiClient,
    token_manager: &TokenManager,
    teardown: &SessionTeardown,
    events: &SessionEvents,
) -> AppResult<String> {
    let Some(current_token) = token_manager.token() else {
        debug!("No stored token to refresh");
        teardown.end_session(SessionEndReason::RefreshFailed).await;
        return Err(AppError::RefreshError("No session to refresh".to_string()));
    };

    // The session may be cleared or replaced while the call is in flight.
    match auth_client.refresh(&current_token).await {
        Ok((token, user)) => {
            let user_id = user.id;
            if !token_manager
                .replace_if_current(&current_token, token.clone(), user.clone())
                .await
            {
                info!("Session changed during token refresh, discarding refreshed token");
                return Err(AppError::RefreshError(
                    "Session changed during refresh".to_string(),
                ));
            }
            info!("Token refreshed successfully for user {}", user_id);
            events.refreshed(user);
            Ok(token)
        }
        Err(e) => {
            error!("Token refresh failed: {}", e);
            teardown
                .end_session_for(&current_token, SessionEndReason::RefreshFailed)
                .await;
            Err(AppError::RefreshError(e.to_string()))
        }
    }
}

// Only ever held for a check-and-swap, so a poisoned lock still holds a
// valid slot.
fn lock_slot(pending: &Mutex<Option<PendingRefresh>>) -> MutexGuard<'_, Option<PendingRefresh>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
