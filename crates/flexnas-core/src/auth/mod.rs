//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionStore`: the login state and the bearer token requests carry
//! - `SessionStorage`: durable storage for the token, username and role
//!
//! Tokens have no client-side expiry; a stored token is trusted until logout.

pub mod error;
pub mod session;
pub mod storage;

pub use error::{LoginError, StorageError};
pub use session::{AuthGrant, Authenticator, SessionData, SessionState, SessionStore, LOGIN_PATH};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageKey};
