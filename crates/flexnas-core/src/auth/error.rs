use std::path::{Path, PathBuf};

use thiserror::Error;

use super::storage::StorageKey;
use crate::api::ApiError;

/// Failures of the persisted session storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid session file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error for '{key}': {source}")]
    Keyring {
        key: StorageKey,
        #[source]
        source: keyring::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a login attempt failed. Each cause stays distinct so the caller can
/// tell a wrong password apart from an unreachable server.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Unable to reach server: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Login rejected: {0}")]
    Rejected(#[source] ApiError),

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => LoginError::InvalidCredentials,
            ApiError::NetworkError(e) => LoginError::Network(e),
            ApiError::InvalidResponse(msg) => LoginError::MalformedResponse(msg),
            other => LoginError::Rejected(other),
        }
    }
}
