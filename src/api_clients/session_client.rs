use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::error_handling::{decode_envelope, map_status_error};
use super::retry_policy::RetryPolicy;
use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::auth::session_teardown::SessionTeardown;
use crate::auth::token_manager::TokenManager;
use crate::auth::token_introspection;
use crate::auth::token_refresh::RefreshCoordinator;
use crate::error::{AppError, AppResult};
use crate::events::SessionEndReason;

/// Authenticated API client.
///
/// Behaves like the underlying transport, but attaches the bearer token,
/// refreshes an expired token before dispatch, and replays a request once
/// after a 401 with a refreshed token.
#[derive(Debug, Clone)]
pub struct SessionClient {
    transport: Arc<dyn HttpTransport>,
    token_manager: Arc<TokenManager>,
    coordinator: Arc<RefreshCoordinator>,
    teardown: SessionTeardown,
    retry_policy: RetryPolicy,
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        token_manager: Arc<TokenManager>,
        coordinator: Arc<RefreshCoordinator>,
        teardown: SessionTeardown,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            token_manager,
            coordinator,
            teardown,
            retry_policy,
        }
    }

    /// Send a request through both credential pipelines.
    ///
    /// Non-2xx responses other than an unrecoverable 401 are returned as
    /// responses. Errors are `NetworkError`, `RefreshError` or
    /// `AuthExpiredError`.
    pub async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        if request.skip_auth {
            return self.dispatch(&request).await;
        }

        let prepared = self.prepare_credentials(request).await?;
        let response = self.dispatch(&prepared).await?;
        self.handle_response(prepared, response).await
    }

    /// Attach the current bearer token, refreshing first if it has expired.
    /// The request is never dispatched with an expired token.
    pub async fn prepare_credentials(&self, mut request: ApiRequest) -> AppResult<ApiRequest> {
        request.bearer = None;
        let Some(token) = self.token_manager.token() else {
            debug!("No session, sending {} {} without credentials", request.method, request.path);
            return Ok(request);
        };

        if token_introspection::is_expired(&token, Utc::now()) {
            debug!(
                "Stored token expired, refreshing before {} {}",
                request.method, request.path
            );
            let fresh = self.coordinator.refresh().await?;
            request.bearer = Some(fresh);
        } else {
            request.bearer = Some(token);
        }
        Ok(request)
    }

    async fn handle_response(
        &self,
        sent: ApiRequest,
        response: ApiResponse,
    ) -> AppResult<ApiResponse> {
        match response.status {
            401 => self.retry_unauthorized(sent, response).await,
            403 => {
                warn!(
                    "Access denied for {} {} [{}]",
                    sent.method, sent.path, sent.request_id
                );
                Ok(response)
            }
            _ => Ok(response),
        }
    }

    /// One refreshed retry per original request; a second 401 ends the session.
    async fn retry_unauthorized(
        &self,
        sent: ApiRequest,
        response: ApiResponse,
    ) -> AppResult<ApiResponse> {
        let Some(sent_token) = sent.bearer.as_deref() else {
            return Err(map_status_error(401, &response.body));
        };

        let retry_token = match self.token_manager.token() {
            None => {
                debug!("Session ended while {} {} was in flight", sent.method, sent.path);
                return Err(map_status_error(401, &response.body));
            }
            Some(current) if current != sent_token => {
                debug!(
                    "Token changed while {} {} was in flight, retrying with the current one",
                    sent.method, sent.path
                );
                current
            }
            Some(_) => self.coordinator.refresh().await?,
        };

        let retry = sent.with_bearer(retry_token);
        let response = self.dispatch(&retry).await?;

        match response.status {
            401 => {
                warn!(
                    "{} {} rejected again after token refresh [{}]",
                    retry.method, retry.path, retry.request_id
                );
                self.teardown.end_session(SessionEndReason::Unauthorized).await;
                Err(map_status_error(401, &response.body))
            }
            403 => {
                warn!(
                    "Access denied for {} {} [{}]",
                    retry.method, retry.path, retry.request_id
                );
                Ok(response)
            }
            _ => Ok(response),
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let mut attempt = 0;
        loop {
            let outcome = self.transport.execute(request).await;
            let retryable = match &outcome {
                Ok(response) => response.status >= 500,
                Err(e) => e.is_retryable(),
            };
            if !retryable || !self.retry_policy.should_retry(attempt) {
                return outcome;
            }

            let delay = self.retry_policy.delay_for(attempt);
            attempt += 1;
            warn!(
                "{} {} failed, retry {}/{} in {:?}",
                request.method, request.path, attempt, self.retry_policy.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Send and decode the `{success, data, message}` envelope.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> AppResult<T> {
        let response = self.send(request).await?;
        decode_envelope(&response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.send_json(ApiRequest::delete(path)).await
    }
}
