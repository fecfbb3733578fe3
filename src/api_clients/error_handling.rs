use log::debug;
use serde::de::DeserializeOwned;

use super::transport::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::models::ApiEnvelope;

/// Error body shape returned by the SkillUp server.
#[derive(Debug, serde::Deserialize)]
struct ServerErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn server_message(response_text: &str) -> String {
    match serde_json::from_str::<ServerErrorResponse>(response_text) {
        Ok(parsed) => parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| "API request failed".to_string()),
        Err(_) if response_text.trim().is_empty() => "API request failed".to_string(),
        Err(_) => response_text.trim().to_string(),
    }
}

/// Map a non-success HTTP status and its body to an AppError.
pub fn map_status_error(status_code: u16, response_text: &str) -> AppError {
    let message = server_message(response_text);
    debug!("Mapping API error: status={}, message={}", status_code, message);

    match status_code {
        400 | 422 => AppError::ValidationError(message),
        401 => AppError::AuthExpiredError(message),
        403 => AppError::AccessDenied(message),
        404 => AppError::NotFoundError(message),
        500..=599 => AppError::ServerError {
            status: status_code,
            message,
        },
        _ => AppError::HttpError(format!("HTTP {}: {}", status_code, message)),
    }
}

/// Decode a `{success, data, message}` envelope, mapping HTTP failures and
/// `success: false` to typed errors.
pub fn decode_envelope<T: DeserializeOwned>(response: &ApiResponse) -> AppResult<T> {
    if !response.is_success() {
        return Err(map_status_error(response.status, &response.body));
    }

    let envelope: ApiEnvelope<T> = response.json()?;
    if !envelope.success {
        return Err(AppError::ValidationError(
            envelope
                .message
                .unwrap_or_else(|| "API request failed".to_string()),
        ));
    }

    envelope.data.ok_or_else(|| {
        AppError::InvalidResponse("Successful response carried no data".to_string())
    })
}
