use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    config,
    management::{StoreError, TokenStore},
    spotify::auth::TokenRefresher,
    types::{ApiErrorBody, Device, DevicesResponse, PlayerStateResponse, RemoteState, Track},
    warning,
};

/// Refresh ahead of a call when the stored token expires within this many seconds.
pub const EXPIRY_MARGIN_SECS: i64 = 240;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no access token stored")]
    NotAuthenticated,
    #[error("network failure: {0}")]
    Network(reqwest::Error),
    #[error("authorization failed")]
    Unauthorized,
    #[error("reauthentication required: {0}")]
    ReauthRequired(String),
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err)
        }
    }
}

impl GatewayError {
    /// Whether the user has to log in again before anything else can succeed.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            GatewayError::NotAuthenticated | GatewayError::ReauthRequired(_)
        )
    }
}

struct Call {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl Call {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn device(self, device_id: Option<&str>) -> Self {
        match device_id {
            Some(id) => self.query("device_id", id),
            None => self,
        }
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Client of the Web API player endpoints.
///
/// Every call reads the access token from the shared [`TokenStore`]. Without a
/// token the call fails with [`GatewayError::NotAuthenticated`] before any I/O.
/// A 401 answer triggers exactly one refresh followed by one retry; a failed
/// refresh clears the store and yields [`GatewayError::ReauthRequired`].
pub struct PlaybackGateway {
    client: Client,
    api_url: String,
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl PlaybackGateway {
    pub fn new(api_url: &str, tokens: Arc<TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            tokens,
            refresher,
        }
    }

    pub fn from_env(tokens: Arc<TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::new(&config::spotify_api_url(), tokens, refresher)
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Fetches the current remote playback state.
    ///
    /// An empty answer (204) or a body without an item maps to
    /// [`RemoteState::NoSession`], which is not an error.
    pub async fn get_state(&self) -> Result<RemoteState, GatewayError> {
        let res = self.send(Call::new(Method::GET, "/me/player")).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(RemoteState::NoSession);
        }

        let body = res.text().await?;
        if body.trim().is_empty() {
            return Ok(RemoteState::NoSession);
        }

        let state: PlayerStateResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(RemoteState::from(state))
    }

    pub async fn devices(&self) -> Result<Vec<Device>, GatewayError> {
        let res = self
            .send(Call::new(Method::GET, "/me/player/devices"))
            .await?;
        Ok(res.json::<DevicesResponse>().await?.devices)
    }

    /// Fetches one track by id.
    pub async fn track(&self, id: &str) -> Result<Track, GatewayError> {
        let res = self
            .send(Call::new(Method::GET, format!("/tracks/{}", id)))
            .await?;
        Ok(res.json::<Track>().await?)
    }

    /// Starts playback of `uri`, optionally on a specific device.
    pub async fn play(&self, uri: &str, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::PUT, "/me/player/play")
            .device(device_id)
            .body(json!({ "uris": [uri] }));
        self.send(call).await.map(drop)
    }

    /// Continues whatever the remote has loaded.
    pub async fn resume(&self, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::PUT, "/me/player/play").device(device_id);
        self.send(call).await.map(drop)
    }

    pub async fn pause(&self, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::PUT, "/me/player/pause").device(device_id);
        self.send(call).await.map(drop)
    }

    pub async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::PUT, "/me/player/seek")
            .query("position_ms", position_ms)
            .device(device_id);
        self.send(call).await.map(drop)
    }

    pub async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::PUT, "/me/player/volume")
            .query("volume_percent", percent.min(100))
            .device(device_id);
        self.send(call).await.map(drop)
    }

    pub async fn skip_next(&self, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::POST, "/me/player/next").device(device_id);
        self.send(call).await.map(drop)
    }

    pub async fn skip_previous(&self, device_id: Option<&str>) -> Result<(), GatewayError> {
        let call = Call::new(Method::POST, "/me/player/previous").device(device_id);
        self.send(call).await.map(drop)
    }

    async fn send(&self, call: Call) -> Result<Response, GatewayError> {
        let mut token = self
            .tokens
            .access_token()
            .await
            .ok_or(GatewayError::NotAuthenticated)?;

        // at most one refresh per call, proactive or on 401
        let mut refreshed = false;
        if self.tokens.expires_within(EXPIRY_MARGIN_SECS).await {
            token = self.refresh().await?;
            refreshed = true;
        }

        let res = self.execute(&call, &token).await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return check(res).await;
        }
        if refreshed {
            return Err(GatewayError::Unauthorized);
        }

        let token = self.refresh().await?;
        let res = self.execute(&call, &token).await?;
        if res.status() == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        check(res).await
    }

    async fn execute(&self, call: &Call, token: &str) -> Result<Response, GatewayError> {
        let url = format!("{}{}", self.api_url, call.path);
        let mut req = self
            .client
            .request(call.method.clone(), url)
            .bearer_auth(token)
            .query(&call.query);

        req = match &call.body {
            Some(body) => req.json(body),
            None if call.method != Method::GET => req.body(Vec::new()),
            None => req,
        };

        Ok(req.send().await?)
    }

    async fn refresh(&self) -> Result<String, GatewayError> {
        let Some(refresh_token) = self.tokens.refresh_token().await else {
            return self.reauthenticate("no refresh token stored").await;
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(token) => {
                self.tokens
                    .store(
                        &token.access_token,
                        token.refresh_token.as_deref(),
                        token.expires_in,
                    )
                    .await?;
                Ok(token.access_token)
            }
            Err(e) => self.reauthenticate(&e.to_string()).await,
        }
    }

    async fn reauthenticate(&self, reason: &str) -> Result<String, GatewayError> {
        if let Err(e) = self.tokens.clear().await {
            warning!("Failed to clear token store: {}", e);
        }
        Err(GatewayError::ReauthRequired(reason.to_string()))
    }
}

async fn check(res: Response) -> Result<Response, GatewayError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => err.error.message,
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };

    Err(GatewayError::Service {
        status: status.as_u16(),
        message,
    })
}
