//! CLI commands

use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use hostel_core::{CallbackNavigator, FileStorage};
use hostel_http::{ClientError, HostelClient};
use http::Method;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session in the data directory
    Login {
        /// Account name
        username: String,

        /// Account password
        #[arg(long, env = "HOSTEL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session and forget the stored credential
    Logout,

    /// Send an authenticated request and print the response body
    Get {
        /// API path, e.g. /api/rooms
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },

    /// Show session and configuration status
    Status,

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a default client configuration file
    Generate {
        /// Output file path (defaults to <data-dir>/config.json)
        output: Option<PathBuf>,
    },
}

/// `HOSTEL_STATE_DIR` if set, otherwise the platform data directory
pub fn default_data_dir() -> PathBuf {
    std::env::var("HOSTEL_STATE_DIR").map_or_else(
        |_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hostel")
        },
        PathBuf::from,
    )
}

impl Commands {
    pub async fn execute(self, data_dir: PathBuf, config_file: Option<PathBuf>) -> Result<()> {
        match self {
            Self::Config { command } => command.execute(&data_dir),
            Self::Login { username, password } => {
                let client = build_client(config_file, &data_dir)?;
                client.login(&username, &password).await?;
                println!("Logged in as {username}");
                Ok(())
            }
            Self::Logout => {
                let client = build_client(config_file, &data_dir)?;
                client.restore_session().await?;
                client.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Get { path, method } => {
                let client = build_client(config_file, &data_dir)?;
                if !client.restore_session().await? {
                    bail!("not logged in; run `hostel login <username>` first");
                }
                fetch(&client, &method, &path).await
            }
            Self::Status => {
                let client = build_client(config_file, &data_dir)?;
                let restored = client.restore_session().await?;
                println!("API:      {}", client.base_url());
                println!("Session:  {}", FileStorage::in_dir(&data_dir).path().display());
                println!(
                    "Status:   {}",
                    if restored { "logged in" } else { "logged out" }
                );
                Ok(())
            }
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, data_dir: &Path) -> Result<()> {
        match self {
            Self::Generate { output } => {
                let config_path = output.unwrap_or_else(|| data_dir.join(config::CONFIG_FILE));

                // Create parent directory if it doesn't exist
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!(
                    "Generated client configuration at: {}",
                    config_path.display()
                );
                Ok(())
            }
        }
    }
}

fn build_client(config_file: Option<PathBuf>, data_dir: &Path) -> Result<HostelClient> {
    let client_config = config::load_client_config(config_file, data_dir)?;

    let navigator = CallbackNavigator::with_callback(|reason| {
        eprintln!("Session ended ({reason}). Run `hostel login <username>` to sign in again.");
    });

    HostelClient::builder()
        .config(client_config)
        .storage(Arc::new(FileStorage::in_dir(data_dir)))
        .navigator(Arc::new(navigator))
        .build()
        .context("failed to build client")
}

async fn fetch(client: &HostelClient, method: &str, path: &str) -> Result<()> {
    let method = parse_method(method)?;
    info!(%method, path, "Sending request");

    let response = match client.send(client.request(method, path)).await {
        Ok(response) => response,
        Err(ClientError::Renewal(e)) => bail!("session could not be renewed: {e}"),
        Err(e) => return Err(e.into()),
    };

    let body = response.text();
    if !response.is_success() {
        bail!("{} {}", response.status, body);
    }

    // Pretty-print JSON, pass anything else through
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {method}"))
}
