//! MusuX Player Library
//!
//! This library provides a Spotify-backed player for the command line: a thin
//! OAuth relay server that performs the token exchange with Spotify, and a
//! playback coordinator that reconciles local play/pause/seek/volume intents
//! with the remote playback device and a polled remote state snapshot.
//!
//! # Modules
//!
//! - `api` - HTTP handlers of the local relay server
//! - `cli` - Command-line consumers of the playback coordinator
//! - `config` - Configuration management and environment variables
//! - `management` - Persisted token store
//! - `playback` - Transport abstraction, device bridge and playback coordinator
//! - `server` - Local HTTP relay server
//! - `spotify` - Spotify accounts and player API clients
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use musux::{config, cli};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), config::ConfigError> {
//!     config::load_env().await?;
//!     cli::status(false).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod management;
pub mod playback;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Starting player state polling");
/// info!("Found {} devices", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authentication completed successfully");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only used at the binary edge. Library code reports failures through its
/// return values and logs with [`warning!`] instead.
///
/// # Example
///
/// ```
/// error!("Failed to load configuration");
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("Failed to pause playback: {}", err);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
