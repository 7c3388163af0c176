//! Configuration management for the MusuX player.
//!
//! This module handles loading and accessing configuration values from environment
//! variables and `.env` files. It provides a centralized way to manage application
//! configuration including Spotify API credentials, relay server settings and the
//! playback coordinator intervals.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! OAuth credentials have no defaults. They are read into [`OAuthSettings`] as
//! optional values and every operation that needs one fails with
//! [`ConfigError::Missing`] instead of building an unusable request.

use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "SPOTIFY_REDIRECT_URI";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:5000";
pub const DEFAULT_DEVICE_NAME: &str = "MusuX Web Player";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Scopes requested during authorization.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
    "streaming",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("cannot prepare configuration directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot load .env file: {0}")]
    Dotenv(String),
}

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the directory structure if it doesn't exist. A missing `.env` file is
/// not an error: the process environment may already carry every variable.
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/musux/.env`
/// - macOS: `~/Library/Application Support/musux/.env`
/// - Windows: `%LOCALAPPDATA%/musux/.env`
pub async fn load_env() -> Result<(), ConfigError> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConfigError::Dotenv(e.to_string())),
    }
}

/// Returns the application's directory inside the platform local data directory.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("musux");
    path
}

/// Returns the path of the persisted auth session.
pub fn session_path() -> PathBuf {
    data_dir().join("cache/session.json")
}

/// Returns the address the local relay server binds to.
///
/// Reads `SERVER_ADDRESS`, e.g. `127.0.0.1:5000`.
pub fn server_addr() -> String {
    env_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS)
}

/// Returns the base URL of the local relay as seen by the client.
///
/// Reads `MUSUX_RELAY_URL` and falls back to `http://` plus [`server_addr`].
pub fn relay_url() -> String {
    env::var("MUSUX_RELAY_URL").unwrap_or_else(|_| format!("http://{}", server_addr()))
}

/// Returns the Spotify OAuth authorization URL.
pub fn spotify_auth_url() -> String {
    env_or("SPOTIFY_AUTH_URL", DEFAULT_AUTH_URL)
}

/// Returns the Spotify OAuth token exchange URL.
pub fn spotify_token_url() -> String {
    env_or("SPOTIFY_TOKEN_URL", DEFAULT_TOKEN_URL)
}

/// Returns the Spotify Web API base URL.
pub fn spotify_api_url() -> String {
    env_or("SPOTIFY_API_URL", DEFAULT_API_URL)
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn env_millis(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env_opt(var) {
        None => Ok(Duration::from_millis(default)),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid { var, value }),
            Ok(ms) => Ok(Duration::from_millis(ms)),
        },
    }
}

/// Client credentials and redirect URI registered with Spotify.
#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl OAuthSettings {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            client_secret: Some(client_secret.to_string()),
            redirect_uri: Some(redirect_uri.to_string()),
        }
    }

    /// Reads `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and `SPOTIFY_REDIRECT_URI`.
    pub fn from_env() -> Self {
        Self {
            client_id: env_opt(CLIENT_ID_VAR),
            client_secret: env_opt(CLIENT_SECRET_VAR),
            redirect_uri: env_opt(REDIRECT_URI_VAR),
        }
    }

    pub fn client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .ok_or(ConfigError::Missing(CLIENT_ID_VAR))
    }

    pub fn client_secret(&self) -> Result<&str, ConfigError> {
        self.client_secret
            .as_deref()
            .ok_or(ConfigError::Missing(CLIENT_SECRET_VAR))
    }

    pub fn redirect_uri(&self) -> Result<&str, ConfigError> {
        self.redirect_uri
            .as_deref()
            .ok_or(ConfigError::Missing(REDIRECT_URI_VAR))
    }
}

/// Settings of the playback side: bridge device name and background intervals.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub device_name: String,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

impl PlayerSettings {
    /// Reads `MUSUX_DEVICE_NAME`, `MUSUX_POLL_INTERVAL_MS` and `MUSUX_TICK_INTERVAL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            device_name: env_or("MUSUX_DEVICE_NAME", DEFAULT_DEVICE_NAME),
            poll_interval: env_millis("MUSUX_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            tick_interval: env_millis("MUSUX_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?,
        })
    }
}
