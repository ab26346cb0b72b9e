//! Core library for the FlexNAS console.
//!
//! - `auth`: session state, login/logout, persisted token storage
//! - `api`: HTTP client for the appliance's management API
//! - `guard`: route guard deciding which views an anonymous user may reach
//! - `config`: configuration file and environment overrides
//! - `models`: API response types

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{LoginError, SessionState, SessionStore, LOGIN_PATH};
pub use config::Config;
pub use guard::{Access, RouteGuard};
