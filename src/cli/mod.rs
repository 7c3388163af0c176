//! # CLI Module
//!
//! Command-line consumers of the library. Every player command builds a
//! [`Player`], primes the coordinator with one remote poll so that resume and
//! toggle know what is loaded, and then issues a single intent.
//!
//! - [`auth`] / [`logout`] - manage the persisted session
//! - [`serve`] - run the OAuth relay in the foreground
//! - [`status`] - print the current track and the available devices
//! - [`run`] - issue one [`PlayerAction`]
//! - [`watch`] - follow playback live with a progress bar
//!
//! Failures are reported through the crate's logging macros; the `error!`
//! macro ends the process, so these functions never return errors.

mod auth;
mod player;
mod serve;
mod watch;

use std::sync::Arc;

pub use auth::{auth, logout};
pub use player::{PlayerAction, print_state, run, status};
pub use serve::serve;
pub use watch::watch;

use crate::{
    config::{self, OAuthSettings, PlayerSettings},
    error, info,
    management::TokenStore,
    playback::{Player, TransportError},
    spotify::auth::{RelayRefresher, SpotifyAccounts, TokenRefresher},
    warning,
};

async fn open_store() -> Arc<TokenStore> {
    match TokenStore::open_default().await {
        Ok(store) => Arc::new(store),
        Err(e) => error!("Failed to open session store: {}", e),
    }
}

/// Refreshes directly against Spotify when the client secret is available
/// locally, otherwise through the relay.
fn refresher() -> Arc<dyn TokenRefresher> {
    let settings = OAuthSettings::from_env();
    if settings.client_id().is_ok() && settings.client_secret().is_ok() {
        Arc::new(SpotifyAccounts::from_env())
    } else {
        Arc::new(RelayRefresher::new(&config::relay_url()))
    }
}

async fn build_player(bridge: bool) -> Player {
    let tokens = open_store().await;
    if !tokens.is_authenticated().await {
        error!("Not logged in. Run `musux auth` first.");
    }

    let settings = match PlayerSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid player settings: {}", e),
    };

    let player = Player::new(&config::spotify_api_url(), tokens, refresher(), settings);
    if bridge {
        match player.bridge.connect().await {
            Ok(()) => info!("Using device bridge."),
            Err(e) => warning!("Device bridge unavailable, using remote API: {}", e),
        }
    }
    player
}

async fn prime(player: &Player) {
    if let Err(e) = player.coordinator.poll_once().await {
        report(TransportError::from(e));
    }
}

fn report(e: TransportError) -> ! {
    if e.requires_login() {
        error!("Your Spotify session has ended. Run `musux auth` to log in again.");
    }
    error!("{}", e);
}
