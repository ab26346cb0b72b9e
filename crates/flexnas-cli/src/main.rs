//! FlexNAS console - command-line access to a FlexNAS appliance.
//!
//! Each subcommand starts the session the way the web console starts a page
//! load: `login` begins on the login view (discarding any stale session),
//! everything else restores the persisted session and passes the route guard.

mod login;

use std::io;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flexnas_core::auth::{FileStorage, SessionStore};
use flexnas_core::config::{Config, StorageBackend};
use flexnas_core::models::volume::format_bytes;
use flexnas_core::{Access, ApiClient, ApiError, RouteGuard};

/// Navigation target for the dashboard
const DASHBOARD_PATH: &str = "/";

/// Navigation target for the storage view
const STORAGE_PATH: &str = "/storage";

#[derive(Parser)]
#[command(name = "flexnas", version, about = "Command-line console for FlexNAS appliances")]
struct Cli {
    /// Appliance URL (overrides config and FLEXNAS_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and persist the session
    Login {
        /// Username (defaults to FLEXNAS_USERNAME or the last used one)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Sign out and forget the persisted session
    Logout,
    /// Show the current session
    Status,
    /// Show system utilization
    System,
    /// List storage volumes
    Volumes,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    info!(server = %config.server_url, "FlexNAS console starting");

    match cli.command {
        Command::Login { username } => login::run(&mut config, username).await,
        Command::Logout => logout(&config),
        Command::Status => status(&config),
        Command::System => system(&config).await,
        Command::Volumes => volumes(&config).await,
    }
}

/// Restore the session for `target` and build a client around it
fn open(config: &Config, target: &str) -> Result<ApiClient> {
    let storage = config.open_storage()?;
    let session = SessionStore::initialize(storage, target);
    Ok(ApiClient::new(&config.server_url, session.into())?)
}

/// Open a client for a protected view, refusing when the guard redirects
fn open_guarded(config: &Config, target: &str) -> Result<ApiClient> {
    let api = open(config, target)?;
    match RouteGuard::new(api.session().clone()).check(target) {
        Access::Allow => Ok(api),
        Access::Redirect(_) => bail!("Not logged in. Run `flexnas login` first."),
    }
}

/// A restored token the server no longer accepts needs a fresh login
fn protected_call_error(err: ApiError) -> anyhow::Error {
    if err.requires_login() {
        anyhow!("The server rejected the saved session. Run `flexnas login` again.")
    } else {
        err.into()
    }
}

fn logout(config: &Config) -> Result<()> {
    let api = open(config, DASHBOARD_PATH)?;
    api.logout();
    println!("Logged out.");
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let api = open(config, DASHBOARD_PATH)?;
    let session = api.session();

    println!("Server:   {}", api.base_url());
    if !session.is_authenticated() {
        println!("Session:  not logged in");
        return Ok(());
    }

    println!("Session:  logged in");
    println!("User:     {}", session.username().as_deref().unwrap_or("-"));
    println!("Role:     {}", session.role().as_deref().unwrap_or("-"));

    if config.storage == StorageBackend::File {
        let storage = FileStorage::new(config.cache_dir()?);
        if let Ok(Some(updated_at)) = storage.last_updated() {
            println!("Since:    {}", updated_at.format("%Y-%m-%d %H:%M UTC"));
        }
    }
    Ok(())
}

async fn system(config: &Config) -> Result<()> {
    let api = open_guarded(config, DASHBOARD_PATH)?;
    let status = api.fetch_system_status().await.map_err(protected_call_error)?;

    println!("Status:   {}", status.status.display_name());
    println!("CPU:      {:.1}%", status.cpu_usage);
    println!("Memory:   {:.1}%", status.memory_usage);
    println!(
        "Storage:  {:.1}% ({} used of {}, {} free)",
        status.storage_usage, status.used_storage, status.total_storage, status.free_storage
    );
    Ok(())
}

async fn volumes(config: &Config) -> Result<()> {
    let api = open_guarded(config, STORAGE_PATH)?;
    let volumes = api.fetch_volumes().await.map_err(protected_call_error)?;

    if volumes.is_empty() {
        println!("No volumes reported.");
        return Ok(());
    }

    println!("{:<20} {:<24} {:<8} {:>10} {}", "DEVICE", "MOUNTPOINT", "FSTYPE", "FREE", "USAGE");
    for volume in &volumes {
        println!(
            "{:<20} {:<24} {:<8} {:>10} {}",
            volume.device,
            volume.mountpoint,
            volume.fstype,
            format_bytes(volume.free),
            volume.usage_display()
        );
    }
    Ok(())
}
