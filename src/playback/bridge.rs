//! Device bridge: a locally registered output device driven directly.
//!
//! The bridge never polls. Its state only moves on notifications emitted by
//! the [`DeviceEngine`] it wraps:
//!
//! ```text
//! Uninitialized --connect()--> Connecting --Ready--> Ready{device_id}
//!                                   |                  |
//!                                   +--errors----------+--NotReady / errors / disconnect()--> Disconnected
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    info,
    playback::transport::{PlaybackTransport, TransportError},
    spotify::player::PlaybackGateway,
    warning,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Connecting,
    Ready { device_id: String },
    Disconnected,
}

/// Asynchronous notifications of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    InitializationError(String),
    AuthenticationError(String),
    AccountError(String),
    PlaybackError(String),
}

/// A vendor playback engine that owns one output device.
///
/// Volume is a fraction in `0.0..=1.0`.
#[async_trait]
pub trait DeviceEngine: Send + Sync {
    /// Registers the device. Returns whether the connection attempt was
    /// accepted; readiness is reported later through `events`.
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Result<bool, TransportError>;
    async fn disconnect(&self);
    async fn load(&self, device_id: &str, uri: &str) -> Result<(), TransportError>;
    async fn resume(&self, device_id: &str) -> Result<(), TransportError>;
    async fn pause(&self, device_id: &str) -> Result<(), TransportError>;
    async fn seek(&self, device_id: &str, position_ms: u64) -> Result<(), TransportError>;
    async fn next_track(&self, device_id: &str) -> Result<(), TransportError>;
    async fn previous_track(&self, device_id: &str) -> Result<(), TransportError>;
    async fn set_volume(&self, device_id: &str, volume: f32) -> Result<(), TransportError>;
}

struct BridgeInner {
    state: BridgeState,
    torn_down: bool,
    last_error: Option<String>,
}

pub struct DeviceBridge {
    engine: Arc<dyn DeviceEngine>,
    inner: Mutex<BridgeInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceBridge {
    pub fn new(engine: Arc<dyn DeviceEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            inner: Mutex::new(BridgeInner {
                state: BridgeState::Uninitialized,
                torn_down: false,
                last_error: None,
            }),
            listener: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BridgeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BridgeState {
        self.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.lock().state, BridgeState::Ready { .. })
    }

    pub fn device_id(&self) -> Option<String> {
        match &self.lock().state {
            BridgeState::Ready { device_id } => Some(device_id.clone()),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Starts listening for engine notifications and asks the engine to connect.
    pub async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        {
            let mut inner = self.lock();
            inner.state = BridgeState::Connecting;
            inner.torn_down = false;
            inner.last_error = None;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge: Weak<Self> = Arc::downgrade(self);
        let listener = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(bridge) = bridge.upgrade() else {
                    break;
                };
                bridge.handle_event(event);
            }
        });
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(listener)
        {
            previous.abort();
        }

        let outcome = self.engine.connect(tx).await;
        match outcome {
            Ok(true) => {
                info!("Device bridge connecting");
                Ok(())
            }
            Ok(false) => {
                self.fail("engine refused the connection".to_string());
                Err(TransportError::Device(
                    "engine refused the connection".to_string(),
                ))
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Tears the bridge down. Later notifications are ignored until the next
    /// [`DeviceBridge::connect`].
    pub async fn disconnect(&self) {
        {
            let mut inner = self.lock();
            inner.state = BridgeState::Disconnected;
            inner.torn_down = true;
        }
        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
        self.engine.disconnect().await;
    }

    /// Applies one engine notification to the state machine.
    pub fn handle_event(&self, event: BridgeEvent) {
        let mut inner = self.lock();
        if inner.torn_down {
            return;
        }

        match event {
            BridgeEvent::Ready { device_id } => {
                if inner.state != BridgeState::Uninitialized {
                    info!("Ready with Device ID {}", device_id);
                    inner.state = BridgeState::Ready { device_id };
                }
            }
            BridgeEvent::NotReady { device_id } => {
                info!("Device ID has gone offline {}", device_id);
                if inner.state != BridgeState::Uninitialized {
                    inner.state = BridgeState::Disconnected;
                }
            }
            BridgeEvent::InitializationError(message) => {
                Self::record_failure(&mut inner, format!("Initialization error: {}", message));
            }
            BridgeEvent::AuthenticationError(message) => {
                Self::record_failure(&mut inner, format!("Authentication error: {}", message));
            }
            BridgeEvent::AccountError(message) => {
                Self::record_failure(&mut inner, format!("Account error: {}", message));
            }
            BridgeEvent::PlaybackError(message) => {
                let message = format!("Playback error: {}", message);
                warning!("{}", message);
                inner.last_error = Some(message);
            }
        }
    }

    fn record_failure(inner: &mut BridgeInner, message: String) {
        warning!("{}", message);
        if inner.state != BridgeState::Uninitialized {
            inner.state = BridgeState::Disconnected;
        }
        inner.last_error = Some(message);
    }

    fn fail(&self, message: String) {
        let mut inner = self.lock();
        inner.state = BridgeState::Disconnected;
        inner.last_error = Some(message);
    }

    fn ready_device(&self) -> Result<String, TransportError> {
        self.device_id().ok_or(TransportError::NotReady)
    }
}

impl Drop for DeviceBridge {
    fn drop(&mut self) {
        if let Some(listener) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
    }
}

#[async_trait]
impl PlaybackTransport for DeviceBridge {
    async fn play(&self, uri: &str) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.load(&device_id, uri).await
    }

    async fn resume(&self) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.resume(&device_id).await
    }

    async fn pause(&self) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.pause(&device_id).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.seek(&device_id, position_ms).await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        let volume = f32::from(percent.min(100)) / 100.0;
        self.engine.set_volume(&device_id, volume).await
    }

    async fn next(&self) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.next_track(&device_id).await
    }

    async fn previous(&self) -> Result<(), TransportError> {
        let device_id = self.ready_device()?;
        self.engine.previous_track(&device_id).await
    }
}

/// Engine backed by a Spotify Connect device found by name, e.g. a local
/// spotifyd or librespot instance. Commands target the device explicitly.
pub struct ConnectEngine {
    gateway: Arc<PlaybackGateway>,
    device_name: String,
}

impl ConnectEngine {
    pub fn new(gateway: Arc<PlaybackGateway>, device_name: &str) -> Self {
        Self {
            gateway,
            device_name: device_name.to_string(),
        }
    }
}

#[async_trait]
impl DeviceEngine for ConnectEngine {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Result<bool, TransportError> {
        let devices = self.gateway.devices().await?;
        let device_id = devices
            .into_iter()
            .filter(|d| d.name.eq_ignore_ascii_case(&self.device_name))
            .find_map(|d| d.id);

        let event = match device_id {
            Some(device_id) => BridgeEvent::Ready { device_id },
            None => BridgeEvent::InitializationError(format!(
                "no device named '{}' is available",
                self.device_name
            )),
        };
        let found = matches!(event, BridgeEvent::Ready { .. });
        // listener gone means the bridge was dropped; nothing to report to
        let _ = events.send(event);
        Ok(found)
    }

    async fn disconnect(&self) {}

    async fn load(&self, device_id: &str, uri: &str) -> Result<(), TransportError> {
        Ok(self.gateway.play(uri, Some(device_id)).await?)
    }

    async fn resume(&self, device_id: &str) -> Result<(), TransportError> {
        Ok(self.gateway.resume(Some(device_id)).await?)
    }

    async fn pause(&self, device_id: &str) -> Result<(), TransportError> {
        Ok(self.gateway.pause(Some(device_id)).await?)
    }

    async fn seek(&self, device_id: &str, position_ms: u64) -> Result<(), TransportError> {
        Ok(self.gateway.seek(position_ms, Some(device_id)).await?)
    }

    async fn next_track(&self, device_id: &str) -> Result<(), TransportError> {
        Ok(self.gateway.skip_next(Some(device_id)).await?)
    }

    async fn previous_track(&self, device_id: &str) -> Result<(), TransportError> {
        Ok(self.gateway.skip_previous(Some(device_id)).await?)
    }

    async fn set_volume(&self, device_id: &str, volume: f32) -> Result<(), TransportError> {
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as u8;
        Ok(self.gateway.set_volume(percent, Some(device_id)).await?)
    }
}
