use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, Response};
use thiserror::Error;
use url::Url;

use crate::{
    config::{self, ConfigError, OAuthSettings},
    management::{StoreError, TokenStore},
    server::{AppState, start_api_server},
    success,
    types::{AccountsErrorBody, MessageResponse, RefreshRequest, TokenResponse},
    warning,
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("token request failed: {0}")]
    Network(reqwest::Error),
    #[error("token request rejected ({status}): {error}")]
    Rejected { status: u16, error: String },
    #[error("unexpected token response: {0}")]
    Decode(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Decode(err.to_string())
        } else {
            AuthError::Network(err)
        }
    }
}

/// Exchanges a refresh token for a new access token.
///
/// The gateway only depends on this seam, so it can refresh either directly
/// against the accounts service or through the local relay.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;
}

/// Client of the Spotify accounts service (authorize and token endpoints).
///
/// Requests are authenticated with the client credentials as HTTP Basic auth,
/// so this client belongs on the relay side where the secret lives.
#[derive(Debug, Clone)]
pub struct SpotifyAccounts {
    client: Client,
    settings: OAuthSettings,
    auth_url: String,
    token_url: String,
}

impl SpotifyAccounts {
    pub fn new(settings: OAuthSettings, auth_url: &str, token_url: &str) -> Self {
        Self {
            client: Client::new(),
            settings,
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            OAuthSettings::from_env(),
            &config::spotify_auth_url(),
            &config::spotify_token_url(),
        )
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Builds the authorization URL the user is sent to.
    ///
    /// Fails when client id, client secret or redirect URI are not
    /// configured: without the secret the later code exchange cannot succeed.
    pub fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        let client_id = self.settings.client_id()?;
        self.settings.client_secret()?;
        let redirect_uri = self.settings.redirect_uri()?;
        let scope = config::SCOPES.join(" ");

        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|_| ConfigError::Invalid {
            var: "SPOTIFY_AUTH_URL",
            value: self.auth_url.clone(),
        })?;

        Ok(url.to_string())
    }

    /// Exchanges an authorization code for access and refresh tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let res = self
            .client
            .post(&self.token_url)
            .header("Authorization", self.basic_auth()?)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        token_response(res).await
    }

    /// Exchanges a refresh token for a fresh access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let res = self
            .client
            .post(&self.token_url)
            .header("Authorization", self.basic_auth()?)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        token_response(res).await
    }

    fn basic_auth(&self) -> Result<String, AuthError> {
        let credentials = format!(
            "{}:{}",
            self.settings.client_id()?,
            self.settings.client_secret()?
        );
        Ok(format!("Basic {}", STANDARD.encode(credentials)))
    }
}

#[async_trait]
impl TokenRefresher for SpotifyAccounts {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.refresh_token(refresh_token).await
    }
}

async fn token_response(res: Response) -> Result<TokenResponse, AuthError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        let error = match serde_json::from_str::<AccountsErrorBody>(&body) {
            Ok(AccountsErrorBody {
                error,
                error_description: Some(description),
            }) => format!("{}: {}", error, description),
            Ok(AccountsErrorBody { error, .. }) => error,
            Err(_) => body,
        };
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            error,
        });
    }

    Ok(res.json::<TokenResponse>().await?)
}

/// Refreshes through the local relay's `POST /api/spotify/refresh`, so the
/// client never needs the client secret.
#[derive(Debug, Clone)]
pub struct RelayRefresher {
    client: Client,
    relay_url: String,
}

impl RelayRefresher {
    pub fn new(relay_url: &str) -> Self {
        Self {
            client: Client::new(),
            relay_url: relay_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenRefresher for RelayRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let res = self
            .client
            .post(format!("{}/api/spotify/refresh", self.relay_url))
            .json(&RefreshRequest {
                refresh_token: Some(refresh_token.to_string()),
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let error = match res.json::<MessageResponse>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        Ok(res.json::<TokenResponse>().await?)
    }
}

/// Runs the complete authorization flow from the command line.
///
/// 1. Starts the local relay server sharing `tokens`
/// 2. Opens the authorization URL in the browser
/// 3. Waits for the callback redirect to land on the relay's home view, which
///    persists the tokens
pub async fn login(tokens: Arc<TokenStore>) -> Result<(), AuthError> {
    tokens.clear().await?;

    let state = AppState::new(SpotifyAccounts::from_env(), Arc::clone(&tokens));
    let auth_url = state.begin_authorization()?;

    let server_state = state.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = start_api_server(server_state).await {
            warning!("Relay server stopped: {}", e);
        }
    });

    if webbrowser::open(&auth_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    let authenticated = wait_for_session(&tokens).await;
    server.abort();

    if authenticated {
        success!("Authentication successful!");
        Ok(())
    } else {
        Err(AuthError::Rejected {
            status: 408,
            error: "authentication failed or timed out".to_string(),
        })
    }
}

/// Polls the store until a session appears, giving up after 120 seconds.
async fn wait_for_session(tokens: &TokenStore) -> bool {
    use std::time::Instant;

    let max_wait = Duration::from_secs(120);
    let start = Instant::now();

    while start.elapsed() < max_wait {
        if tokens.is_authenticated().await {
            return true;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    false
}
