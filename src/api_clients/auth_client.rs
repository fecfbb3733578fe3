use log::{debug, info, warn};
use std::sync::Arc;

use super::error_handling::decode_envelope;
use super::transport::{ApiRequest, HttpTransport};
use crate::constants::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::error::{AppError, AppResult};
use crate::models::{AuthDataResponse, LoginCredentials, RegisterData, User};

const CONNECT_FAILURE_MESSAGE: &str =
    "Unable to connect to server. Please check your connection and try again.";

/// Thin wrapper over the token-issuing auth endpoints.
///
/// All calls bypass the credential pipeline: login and register carry no
/// bearer, and refresh carries the token being exchanged.
#[derive(Debug, Clone)]
pub struct AuthApiClient {
    transport: Arc<dyn HttpTransport>,
}

impl AuthApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> AppResult<(String, User)> {
        let request = ApiRequest::post(LOGIN_PATH).json(credentials)?.without_auth();
        let (token, user) = self
            .exchange(&request)
            .await
            .map_err(|e| sign_in_error(e, "Login failed"))?;
        info!("Signed in as user {} ({})", user.id, user.role.as_str());
        Ok((token, user))
    }

    pub async fn register(&self, data: &RegisterData) -> AppResult<(String, User)> {
        let request = ApiRequest::post(REGISTER_PATH).json(data)?.without_auth();
        let (token, user) = self
            .exchange(&request)
            .await
            .map_err(|e| sign_in_error(e, "Registration failed"))?;
        info!("Registered user {} ({})", user.id, user.role.as_str());
        Ok((token, user))
    }

    /// Exchange `current_token` for a new token and profile.
    pub async fn refresh(&self, current_token: &str) -> AppResult<(String, User)> {
        let request = ApiRequest::post(REFRESH_PATH)
            .without_auth()
            .with_bearer(current_token);
        debug!("Requesting token refresh [{}]", request.request_id);
        self.exchange(&request).await
    }

    async fn exchange(&self, request: &ApiRequest) -> AppResult<(String, User)> {
        let response = self.transport.execute(request).await?;
        let data: AuthDataResponse = decode_envelope(&response)?;
        if data.token.trim().is_empty() {
            return Err(AppError::InvalidResponse(
                "Auth response carried an empty token".to_string(),
            ));
        }
        Ok(data.into_parts())
    }
}

/// Login and register report the server's message as an auth failure, and
/// connection problems with a fixed user-facing message.
fn sign_in_error(error: AppError, fallback: &str) -> AppError {
    match error {
        AppError::NetworkError(detail) => {
            warn!("{}: {}", fallback, detail);
            AppError::NetworkError(CONNECT_FAILURE_MESSAGE.to_string())
        }
        AppError::ValidationError(message)
        | AppError::AuthExpiredError(message)
        | AppError::AccessDenied(message)
        | AppError::NotFoundError(message) => AppError::AuthError(message),
        AppError::InvalidResponse(detail) => {
            warn!("{}: {}", fallback, detail);
            AppError::AuthError(fallback.to_string())
        }
        other => other,
    }
}
