//! The `login` subcommand: collect credentials, validate, authenticate.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::warn;

use flexnas_core::api::ApiError;
use flexnas_core::config::{Config, ENV_PASSWORD};
use flexnas_core::{LoginError, LOGIN_PATH};

/// Minimum password length accepted by the login form
const MIN_PASSWORD_LENGTH: usize = 8;

/// Check the form fields before contacting the server
pub fn validate(username: &str, password: &str) -> Result<(), &'static str> {
    if username.trim().is_empty() {
        return Err("Username is required");
    }
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Message shown to the user for each failure kind
pub fn user_message(err: &LoginError) -> String {
    match err {
        LoginError::InvalidCredentials => "Invalid username or password".to_string(),
        LoginError::Network(e) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        LoginError::Network(_) => {
            "Unable to connect to the server. Check the address and your network.".to_string()
        }
        LoginError::Rejected(ApiError::RateLimited) => {
            "Too many login attempts. Please wait and try again.".to_string()
        }
        LoginError::Rejected(e) => format!("The server refused the login: {}", e),
        LoginError::MalformedResponse(_) => {
            "The server sent an unexpected login response.".to_string()
        }
        LoginError::Storage(e) => format!("The session could not be saved: {}", e),
    }
}

pub async fn run(config: &mut Config, username: Option<String>) -> Result<()> {
    // Starting on the login view drops any stale session before we ask for credentials
    let api = super::open(config, LOGIN_PATH)?;

    let username = match username.or_else(|| config.last_username.clone()) {
        Some(username) => username,
        None => prompt_username()?,
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if let Err(msg) = validate(&username, &password) {
        bail!(msg);
    }

    if let Err(e) = api.login(username.trim(), &password).await {
        bail!(user_message(&e));
    }

    config.last_username = Some(username.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Login successful.");
    Ok(())
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}
