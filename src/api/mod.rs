//! # API Module
//!
//! HTTP handlers of the local relay server. The relay keeps the Spotify client
//! secret away from the player and owns the browser side of the login.
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - [`auth_url`] - `GET /api/spotify/auth/url`, returns `{authUrl}`
//! - [`token`] - `POST /api/spotify/token {code, redirectUri}`, proxies the code exchange
//! - [`refresh`] - `POST /api/spotify/refresh {refreshToken?}`, proxies a refresh,
//!   falling back to the session's refresh token
//! - [`callback`] - `GET /api/spotify/callback`, exchanges the code and redirects
//!   to the home view with the tokens, or to the error view
//!
//! ### Views
//!
//! - [`home`] - persists tokens arriving from the callback redirect
//! - [`error_view`] - shows a login failure with a link back home
//!
//! ### Monitoring
//!
//! - [`health`] - status and version

mod auth;
mod callback;
mod health;
mod views;

pub use auth::auth_url;
pub use auth::refresh;
pub use auth::token;
pub use callback::callback;
pub use health::health;
pub use views::error_view;
pub use views::home;
