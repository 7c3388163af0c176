//! # Spotify Integration Module
//!
//! Clients for the two Spotify services the player talks to:
//!
//! ```text
//! Relay server / CLI
//!          ↓
//! Spotify Integration Layer
//!     ├── auth    (accounts service: authorize URL, code exchange, refresh)
//!     └── player  (Web API player endpoints: state, transport controls, devices)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Authentication
//!
//! [`auth`] implements the authorization-code flow with client credentials sent
//! as HTTP Basic auth. The client secret only ever lives in the relay; the
//! player side refreshes through the [`auth::TokenRefresher`] seam, backed by
//! either the accounts service directly or the relay's refresh endpoint.
//!
//! ## Player
//!
//! [`player::PlaybackGateway`] wraps `GET /me/player`, `GET /me/player/devices`
//! and the transport-control endpoints. Authorization failures trigger one
//! refresh-and-retry; errors stay distinguishable (no token, network, repeated
//! authorization failure, reauthentication required, service error) so callers
//! can decide how to react.

pub mod auth;
pub mod player;
