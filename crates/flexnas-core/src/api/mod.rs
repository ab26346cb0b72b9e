//! REST API client module for the FlexNAS management API.
//!
//! This module provides the `ApiClient` for logging in and for calling
//! protected routes such as system status and storage volumes.
//!
//! Protected routes expect a JWT bearer token obtained from `/api/login`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
