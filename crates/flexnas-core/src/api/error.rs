use serde::Deserialize;
use thiserror::Error;

/// Failures of calls to the management API, classified by HTTP status.
///
/// The message carried by most variants is the server's own explanation
/// when it sent one (`{"error": ...}` from route handlers, `{"msg": ...}`
/// from the JWT layer), otherwise the raw body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not logged in or session rejected by the server")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    BadRequest(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Longest body excerpt kept in an error message
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "msg", alias = "message")]
    error: String,
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            400 | 409 | 422 => ApiError::BadRequest(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// True when the fix is to log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    fn server_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => truncate(&parsed.error),
            Err(_) => truncate(body.trim()),
        }
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY_LENGTH {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &text[..end], text.len())
}
