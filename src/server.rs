use std::{
    collections::HashMap,
    net::SocketAddr,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    Extension, Router,
    routing::{get, post},
};

use crate::{
    api, config, info,
    management::TokenStore,
    spotify::auth::{AuthError, SpotifyAccounts},
    utils,
};

/// How long an issued OAuth `state` stays valid.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on outstanding OAuth `state` values; the oldest is dropped first.
pub const MAX_PENDING_STATES: usize = 32;

/// Shared state of the relay: the accounts client, the session store the
/// landing view writes to, and the OAuth `state` values handed out but not yet
/// seen on a callback.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<SpotifyAccounts>,
    pub tokens: Arc<TokenStore>,
    pending: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AppState {
    pub fn new(accounts: SpotifyAccounts, tokens: Arc<TokenStore>) -> Self {
        Self {
            accounts: Arc::new(accounts),
            tokens,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds a fresh authorization URL and remembers its `state`.
    ///
    /// Expired states are pruned first, and past [`MAX_PENDING_STATES`] the
    /// oldest one is forgotten.
    pub fn begin_authorization(&self) -> Result<String, AuthError> {
        let state = utils::generate_state();
        let url = self.accounts.authorize_url(&state)?;

        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, issued| now.duration_since(*issued) < STATE_TTL);
        while pending.len() >= MAX_PENDING_STATES {
            let Some(oldest) = pending
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            pending.remove(&oldest);
        }
        pending.insert(state, now);
        Ok(url)
    }

    /// Consumes a pending `state`. Each one is accepted once, and only
    /// within [`STATE_TTL`] of being issued.
    pub fn complete_authorization(&self, state: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)
            .is_some_and(|issued| issued.elapsed() < STATE_TTL)
    }

    /// Number of authorization states still waiting for a callback.
    pub fn pending_authorizations(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::home))
        .route("/error", get(api::error_view))
        .route("/health", get(api::health))
        .route("/api/spotify/auth/url", get(api::auth_url))
        .route("/api/spotify/token", post(api::token))
        .route("/api/spotify/refresh", post(api::refresh))
        .route("/api/spotify/callback", get(api::callback))
        .layer(Extension(state))
}

pub async fn start_api_server(state: AppState) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from_str(&config::server_addr()).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Failed to parse server address: {}", e),
        )
    })?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Relay listening on http://{}", addr);
    axum::serve(listener, router(state)).await
}
