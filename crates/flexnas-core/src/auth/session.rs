use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::error::LoginError;
use super::storage::{SessionStorage, StorageKey};

/// Navigation target of the login view. Starting there always resets the session.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub token: String,
    pub username: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(SessionData),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn data(&self) -> Option<&SessionData> {
        match self {
            SessionState::Authenticated(data) => Some(data),
            SessionState::Anonymous => None,
        }
    }
}

/// What a successful authentication call hands back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// The remote side of `SessionStore::login`.
pub trait Authenticator {
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthGrant, LoginError>> + Send;
}

/// Owns the authentication state and its persisted copy.
///
/// Share it as `Arc<SessionStore>` between the route guard and the API
/// client; the client reads the token on every request, so there is no
/// separate header to keep in sync.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Build the session for a startup navigation `target`.
    ///
    /// Starting on the login view wipes whatever was persisted. Any other
    /// target restores a persisted token without contacting the server.
    pub fn initialize(storage: Arc<dyn SessionStorage>, target: &str) -> Self {
        let state = if target == LOGIN_PATH {
            debug!("Starting on login view, clearing persisted session");
            if let Err(e) = storage.clear() {
                warn!(error = %e, "Failed to clear persisted session");
            }
            SessionState::Anonymous
        } else {
            Self::restore(storage.as_ref())
        };

        debug!(authenticated = state.is_authenticated(), view = target, "Session initialized");

        Self {
            storage,
            state: RwLock::new(state),
        }
    }

    fn restore(storage: &dyn SessionStorage) -> SessionState {
        let token = match storage.get(StorageKey::Token) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                debug!("No persisted token found");
                return SessionState::Anonymous;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                return SessionState::Anonymous;
            }
        };

        let metadata = |key: StorageKey| match storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, %key, "Failed to read persisted session metadata");
                None
            }
        };

        debug!("Restored persisted token");
        SessionState::Authenticated(SessionData {
            token,
            username: metadata(StorageKey::User),
            role: metadata(StorageKey::Role),
        })
    }

    /// Authenticate against the server and, on success, persist and adopt the token.
    ///
    /// Nothing is written and the current state is kept unless the server
    /// returned a non-empty token and that token was stored.
    pub async fn login<A: Authenticator>(
        &self,
        auth: &A,
        username: &str,
        password: &str,
    ) -> Result<(), LoginError> {
        debug!(username, "Attempting login");

        let grant = match auth.authenticate(username, password).await {
            Ok(grant) if grant.access_token.is_empty() => {
                error!(username, "Login response carried an empty token");
                return Err(LoginError::MalformedResponse(
                    "access_token is empty".to_string(),
                ));
            }
            Ok(grant) => grant,
            Err(e) => {
                error!(username, error = %e, "Login failed");
                return Err(e);
            }
        };

        self.adopt(grant)?;

        info!(username, "Login successful");
        Ok(())
    }

    /// Persist `grant` and make it the current session.
    ///
    /// The state lock is held across the storage writes so overlapping logins
    /// and logouts leave storage and memory agreeing on one token.
    fn adopt(&self, grant: AuthGrant) -> Result<(), LoginError> {
        let mut state = self.write_state();

        if let Err(e) = self.storage.set(StorageKey::Token, &grant.access_token) {
            error!(error = %e, "Failed to persist token");
            return Err(e.into());
        }

        for (key, value) in [(StorageKey::User, &grant.user), (StorageKey::Role, &grant.role)] {
            let result = match value {
                Some(value) => self.storage.set(key, value),
                None => self.storage.remove(key),
            };
            if let Err(e) = result {
                warn!(error = %e, %key, "Failed to persist session metadata");
            }
        }

        *state = SessionState::Authenticated(SessionData {
            token: grant.access_token,
            username: grant.user,
            role: grant.role,
        });
        Ok(())
    }

    /// Drop the credential and everything persisted with it. Safe to call repeatedly.
    pub fn logout(&self) {
        let mut state = self.write_state();

        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }

        let previous = std::mem::take(&mut *state);
        drop(state);

        if previous.is_authenticated() {
            info!("Logged out");
        } else {
            debug!("Logout with no active session");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_authenticated()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.read_state().clone()
    }

    /// The bearer token outgoing requests should carry, if any
    pub fn token(&self) -> Option<String> {
        self.read_state().data().map(|d| d.token.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.read_state().data().and_then(|d| d.username.clone())
    }

    pub fn role(&self) -> Option<String> {
        self.read_state().data().and_then(|d| d.role.clone())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Tests
// ============================================================================
