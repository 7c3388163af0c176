//! Playback transport abstraction for dispatching playback commands.
//!
//! The gateway and the device bridge both implement [`PlaybackTransport`].
//! [`TransportSelector`] picks between them on bridge readiness, so the
//! coordinator only ever holds one transport.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    playback::bridge::DeviceBridge,
    spotify::player::{GatewayError, PlaybackGateway},
    types::RemoteState,
    warning,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device bridge is not ready")]
    NotReady,
    #[error("device error: {0}")]
    Device(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl TransportError {
    pub fn requires_login(&self) -> bool {
        matches!(self, TransportError::Gateway(e) if e.requires_login())
    }

    /// Authorization outcomes are shared by both paths through the token
    /// store; retrying them elsewhere would repeat the refresh.
    pub fn is_authorization(&self) -> bool {
        self.requires_login()
            || matches!(self, TransportError::Gateway(GatewayError::Unauthorized))
    }
}

/// Transport-control primitives shared by every execution path.
#[async_trait]
pub trait PlaybackTransport: Send + Sync {
    /// Start playback of a track URI.
    async fn play(&self, uri: &str) -> Result<(), TransportError>;
    /// Continue the loaded track.
    async fn resume(&self) -> Result<(), TransportError>;
    async fn pause(&self) -> Result<(), TransportError>;
    /// Seek to an absolute position (milliseconds).
    async fn seek(&self, position_ms: u64) -> Result<(), TransportError>;
    /// Set the output volume, 0 to 100.
    async fn set_volume(&self, percent: u8) -> Result<(), TransportError>;
    async fn next(&self) -> Result<(), TransportError>;
    async fn previous(&self) -> Result<(), TransportError>;
}

/// Source of remote playback snapshots for the poll loop.
#[async_trait]
pub trait RemoteStateSource: Send + Sync {
    async fn get_state(&self) -> Result<RemoteState, GatewayError>;
}

#[async_trait]
impl PlaybackTransport for PlaybackGateway {
    async fn play(&self, uri: &str) -> Result<(), TransportError> {
        Ok(PlaybackGateway::play(self, uri, None).await?)
    }

    async fn resume(&self) -> Result<(), TransportError> {
        Ok(PlaybackGateway::resume(self, None).await?)
    }

    async fn pause(&self) -> Result<(), TransportError> {
        Ok(PlaybackGateway::pause(self, None).await?)
    }

    async fn seek(&self, position_ms: u64) -> Result<(), TransportError> {
        Ok(PlaybackGateway::seek(self, position_ms, None).await?)
    }

    async fn set_volume(&self, percent: u8) -> Result<(), TransportError> {
        Ok(PlaybackGateway::set_volume(self, percent, None).await?)
    }

    async fn next(&self) -> Result<(), TransportError> {
        Ok(self.skip_next(None).await?)
    }

    async fn previous(&self) -> Result<(), TransportError> {
        Ok(self.skip_previous(None).await?)
    }
}

#[async_trait]
impl RemoteStateSource for PlaybackGateway {
    async fn get_state(&self) -> Result<RemoteState, GatewayError> {
        PlaybackGateway::get_state(self).await
    }
}

/// One transport-control intent, as dispatched to a path.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Play(String),
    Resume,
    Pause,
    Seek(u64),
    Volume(u8),
    Next,
    Previous,
}

impl TransportCommand {
    pub async fn apply(&self, transport: &dyn PlaybackTransport) -> Result<(), TransportError> {
        match self {
            TransportCommand::Play(uri) => transport.play(uri).await,
            TransportCommand::Resume => transport.resume().await,
            TransportCommand::Pause => transport.pause().await,
            TransportCommand::Seek(ms) => transport.seek(*ms).await,
            TransportCommand::Volume(percent) => transport.set_volume(*percent).await,
            TransportCommand::Next => transport.next().await,
            TransportCommand::Previous => transport.previous().await,
        }
    }
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCommand::Play(uri) => write!(f, "play {}", uri),
            TransportCommand::Resume => write!(f, "resume"),
            TransportCommand::Pause => write!(f, "pause"),
            TransportCommand::Seek(ms) => write!(f, "seek to {} ms", ms),
            TransportCommand::Volume(percent) => write!(f, "set volume to {}%", percent),
            TransportCommand::Next => write!(f, "skip to next"),
            TransportCommand::Previous => write!(f, "skip to previous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePath {
    Bridge,
    Gateway,
}

impl fmt::Display for ActivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivePath::Bridge => write!(f, "device bridge"),
            ActivePath::Gateway => write!(f, "remote gateway"),
        }
    }
}

/// Routes commands to the device bridge while it is ready, else to the gateway.
///
/// A bridge failure is soft: that one command is retried on the gateway and the
/// bridge keeps its state. Authorization failures are returned as they are.
pub struct TransportSelector {
    gateway: Arc<dyn PlaybackTransport>,
    bridge: Option<Arc<DeviceBridge>>,
    last_path: Mutex<Option<ActivePath>>,
}

impl TransportSelector {
    pub fn new(gateway: Arc<dyn PlaybackTransport>, bridge: Option<Arc<DeviceBridge>>) -> Self {
        Self {
            gateway,
            bridge,
            last_path: Mutex::new(None),
        }
    }

    /// The path the next command will try first.
    pub fn active_path(&self) -> ActivePath {
        match &self.bridge {
            Some(bridge) if bridge.is_ready() => ActivePath::Bridge,
            _ => ActivePath::Gateway,
        }
    }

    /// The path that executed the most recent command.
    pub fn last_path(&self) -> Option<ActivePath> {
        *self.last_path.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes `command` and returns the path that carried it out.
    pub async fn dispatch(&self, command: TransportCommand) -> Result<ActivePath, TransportError> {
        if let Some(bridge) = self.bridge.as_ref().filter(|b| b.is_ready()) {
            self.record(ActivePath::Bridge);
            match command.apply(bridge.as_ref()).await {
                Ok(()) => return Ok(ActivePath::Bridge),
                Err(e) if e.is_authorization() => return Err(e),
                Err(e) => warning!(
                    "Device bridge failed to {}: {}. Falling back to remote gateway",
                    command,
                    e
                ),
            }
        }

        self.record(ActivePath::Gateway);
        command.apply(self.gateway.as_ref()).await?;
        Ok(ActivePath::Gateway)
    }

    fn record(&self, path: ActivePath) {
        *self.last_path.lock().unwrap_or_else(PoisonError::into_inner) = Some(path);
    }
}

#[async_trait]
impl PlaybackTransport for TransportSelector {
    async fn play(&self, uri: &str) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Play(uri.to_string())).await.map(drop)
    }

    async fn resume(&self) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Resume).await.map(drop)
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Pause).await.map(drop)
    }

    async fn seek(&self, position_ms: u64) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Seek(position_ms)).await.map(drop)
    }

    async fn set_volume(&self, percent: u8) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Volume(percent)).await.map(drop)
    }

    async fn next(&self) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Next).await.map(drop)
    }

    async fn previous(&self) -> Result<(), TransportError> {
        self.dispatch(TransportCommand::Previous).await.map(drop)
    }
}
