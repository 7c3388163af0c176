//! # Playback Module
//!
//! Everything between a user intent and the remote player:
//!
//! ```text
//! CLI consumers
//!      ↓
//! PlaybackCoordinator  ── poll ──→ RemoteStateSource (gateway)
//!      ↓
//! TransportSelector
//!      ├── DeviceBridge (while ready)
//!      └── PlaybackGateway
//! ```
//!
//! - [`transport`] - the transport trait, commands and the active-path selector
//! - [`bridge`] - the device bridge state machine and its engines
//! - [`coordinator`] - canonical playback state, optimistic intents, background tasks

pub mod bridge;
pub mod coordinator;
pub mod transport;

use std::sync::Arc;

use crate::{
    config::PlayerSettings,
    management::TokenStore,
    spotify::{auth::TokenRefresher, player::PlaybackGateway},
};

pub use bridge::{BridgeEvent, BridgeState, ConnectEngine, DeviceBridge, DeviceEngine};
pub use coordinator::{PlaybackCoordinator, PlaybackState, PlaybackStatus, PollOutcome};
pub use transport::{
    ActivePath, PlaybackTransport, RemoteStateSource, TransportCommand, TransportError,
    TransportSelector,
};

/// A coordinator wired to the real gateway and a Connect device bridge.
pub struct Player {
    pub gateway: Arc<PlaybackGateway>,
    pub bridge: Arc<DeviceBridge>,
    pub selector: Arc<TransportSelector>,
    pub coordinator: Arc<PlaybackCoordinator>,
}

impl Player {
    pub fn new(
        api_url: &str,
        tokens: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        settings: PlayerSettings,
    ) -> Self {
        let gateway = Arc::new(PlaybackGateway::new(
            api_url,
            Arc::clone(&tokens),
            refresher,
        ));
        let engine = ConnectEngine::new(Arc::clone(&gateway), &settings.device_name);
        let bridge = DeviceBridge::new(Arc::new(engine));
        let selector = Arc::new(TransportSelector::new(
            gateway.clone(),
            Some(Arc::clone(&bridge)),
        ));
        let coordinator = PlaybackCoordinator::new(
            selector.clone(),
            gateway.clone(),
            tokens,
            settings,
        );

        Self {
            gateway,
            bridge,
            selector,
            coordinator,
        }
    }
}
