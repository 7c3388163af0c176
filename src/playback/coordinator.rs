//! Playback coordinator: the canonical "what is playing now" of this client.
//!
//! Local intents update the state optimistically and are then dispatched to
//! the transport. Settlements are reconciled with per-field-group generation
//! counters:
//!
//! - an intent captures the generation of every group it touches (`transport`:
//!   track, duration, is-playing and status; `progress`; `volume`) and bumps it
//! - when it settles, success is applied and failure rolled back only if the
//!   group's generation is still the captured one, so the latest issued intent
//!   wins over stale settlements
//! - a failure that rolls back onto the state of an earlier transport intent
//!   also replays how that earlier intent settled, so a superseded play that
//!   already succeeded never leaves the state stuck in `Loading`
//! - a poll result is applied only if no intent was issued since the poll was
//!   issued and no intent was in flight at either end of the poll
//!
//! A poll or intent that ends the session resets the state to
//! [`PlaybackStatus::SignedOut`].
//!
//! Two background tasks keep the state fresh: a remote poll every
//! `poll_interval` and a local progress ticker every `tick_interval` while
//! playing.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, interval_at},
};

use crate::{
    config::PlayerSettings,
    info,
    management::TokenStore,
    playback::transport::{PlaybackTransport, RemoteStateSource, TransportError},
    spotify::player::GatewayError,
    types::{RemoteState, Track},
    warning,
};

pub const DEFAULT_VOLUME: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    /// An intent was issued and awaits confirmation.
    Loading,
    Playing,
    Paused,
    /// The session ended and a new login is required.
    SignedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub volume: u8,
    pub status: PlaybackStatus,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            track: None,
            is_playing: false,
            progress_ms: 0,
            duration_ms: 0,
            volume: DEFAULT_VOLUME,
            status: PlaybackStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No session token; nothing was requested.
    Skipped,
    Applied,
    /// An intent raced the poll; the result was discarded.
    Stale,
}

#[derive(Debug, Default, Clone, Copy)]
struct Generations {
    transport: u64,
    progress: u64,
    volume: u64,
}

#[derive(Default)]
struct Shared {
    state: PlaybackState,
    generations: Generations,
    intent_seq: u64,
    in_flight: usize,
    last_error: Option<String>,
    /// How transport intents settled after a newer one took over, by generation.
    superseded: BTreeMap<u64, Settled>,
}

#[derive(Debug)]
enum Settled {
    Succeeded,
    Failed(TransportClaim),
}

/// Values an intent overwrote, restored when it fails.
#[derive(Debug, Default)]
struct Rollback {
    transport: Option<TransportClaim>,
    progress: Option<(u64, u64)>,
    volume: Option<(u64, u8)>,
}

/// The transport generation an intent took and the fields it overwrote.
#[derive(Debug)]
struct TransportClaim {
    generation: u64,
    fields: TransportFields,
}

#[derive(Debug, Clone)]
struct TransportFields {
    track: Option<Track>,
    is_playing: bool,
    duration_ms: u64,
    status: PlaybackStatus,
}

impl Shared {
    fn begin_intent(&mut self) {
        self.intent_seq += 1;
        self.in_flight += 1;
    }

    fn claim_transport(&mut self, rollback: &mut Rollback) -> u64 {
        self.generations.transport += 1;
        let generation = self.generations.transport;
        // generations above a restored one are handed out again
        self.superseded.split_off(&generation);
        rollback.transport = Some(TransportClaim {
            generation,
            fields: TransportFields {
                track: self.state.track.clone(),
                is_playing: self.state.is_playing,
                duration_ms: self.state.duration_ms,
                status: self.state.status,
            },
        });
        generation
    }

    fn claim_progress(&mut self, rollback: &mut Rollback) {
        self.generations.progress += 1;
        rollback.progress = Some((self.generations.progress, self.state.progress_ms));
    }

    fn claim_volume(&mut self, rollback: &mut Rollback) {
        self.generations.volume += 1;
        rollback.volume = Some((self.generations.volume, self.state.volume));
    }

    fn transport_succeeded(&mut self, claim: TransportClaim) {
        if self.generations.transport == claim.generation {
            self.superseded.clear();
        } else {
            self.superseded.insert(claim.generation, Settled::Succeeded);
        }
    }

    /// Restores what `claim` overwrote and hands the transport group back to
    /// the intent before it, replaying that intent's outcome if it has settled.
    fn restore_transport(&mut self, mut claim: TransportClaim) {
        loop {
            self.generations.transport = claim.generation - 1;
            self.state.track = claim.fields.track;
            self.state.is_playing = claim.fields.is_playing;
            self.state.duration_ms = claim.fields.duration_ms;
            self.state.status = claim.fields.status;

            match self.superseded.remove(&self.generations.transport) {
                Some(Settled::Failed(earlier)) => claim = earlier,
                Some(Settled::Succeeded) => {
                    if self.state.status == PlaybackStatus::Loading {
                        self.state.is_playing = true;
                        self.state.status = PlaybackStatus::Playing;
                    }
                    return;
                }
                None => return,
            }
        }
    }

    fn roll_back(&mut self, rollback: Rollback) {
        if let Some(claim) = rollback.transport {
            if self.generations.transport == claim.generation {
                self.restore_transport(claim);
            } else {
                self.superseded
                    .insert(claim.generation, Settled::Failed(claim));
            }
        }
        if let Some((generation, progress_ms)) = rollback.progress {
            if self.generations.progress == generation {
                self.state.progress_ms = progress_ms;
            }
        }
        if let Some((generation, volume)) = rollback.volume {
            if self.generations.volume == generation {
                self.state.volume = volume;
            }
        }
    }

    fn sign_out(&mut self) {
        let volume = self.state.volume;
        self.state = PlaybackState {
            volume,
            status: PlaybackStatus::SignedOut,
            ..PlaybackState::default()
        };
        self.superseded.clear();
    }

    fn apply_remote(&mut self, remote: RemoteState) {
        match remote {
            RemoteState::NoSession => {
                let volume = self.state.volume;
                self.state = PlaybackState {
                    volume,
                    ..PlaybackState::default()
                };
            }
            RemoteState::Active(snapshot) => {
                let duration_ms = snapshot.track.duration_ms;
                self.state = PlaybackState {
                    track: Some(snapshot.track),
                    is_playing: snapshot.is_playing,
                    progress_ms: snapshot.progress_ms.min(duration_ms),
                    duration_ms,
                    volume: snapshot.volume_percent.unwrap_or(self.state.volume).min(100),
                    status: if snapshot.is_playing {
                        PlaybackStatus::Playing
                    } else {
                        PlaybackStatus::Paused
                    },
                };
            }
        }
    }
}

pub struct PlaybackCoordinator {
    transport: Arc<dyn PlaybackTransport>,
    source: Arc<dyn RemoteStateSource>,
    tokens: Arc<TokenStore>,
    settings: PlayerSettings,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<PlaybackState>,
    playing_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackCoordinator {
    pub fn new(
        transport: Arc<dyn PlaybackTransport>,
        source: Arc<dyn RemoteStateSource>,
        tokens: Arc<TokenStore>,
        settings: PlayerSettings,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PlaybackState::default());
        let (playing_tx, _) = watch::channel(false);
        Arc::new(Self {
            transport,
            source,
            tokens,
            settings,
            shared: Mutex::new(Shared::default()),
            state_tx,
            playing_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the current state to subscribers and the ticker.
    fn commit(&self, shared: &Shared) {
        let state = &shared.state;
        self.state_tx.send_if_modified(|current| {
            if current != state {
                *current = state.clone();
                true
            } else {
                false
            }
        });
        self.playing_tx.send_if_modified(|playing| {
            if *playing != state.is_playing {
                *playing = state.is_playing;
                true
            } else {
                false
            }
        });
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Message of the most recent failed intent or poll, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Plays `track`, or resumes the current track when `track` is `None`.
    ///
    /// Without a track and nothing current this is a no-op.
    pub async fn play(&self, track: Option<Track>) -> Result<(), TransportError> {
        let mut rollback = Rollback::default();
        let generation = {
            let mut shared = self.lock();
            let generation = match &track {
                Some(track) => {
                    let generation = shared.claim_transport(&mut rollback);
                    shared.claim_progress(&mut rollback);
                    shared.state.track = Some(track.clone());
                    shared.state.duration_ms = track.duration_ms;
                    shared.state.progress_ms = 0;
                    generation
                }
                None if shared.state.track.is_some() => shared.claim_transport(&mut rollback),
                None => {
                    info!("No track provided and no current track");
                    return Ok(());
                }
            };
            shared.state.status = PlaybackStatus::Loading;
            shared.begin_intent();
            self.commit(&shared);
            generation
        };

        let result = match &track {
            Some(track) => {
                info!("Playing new track: {} ({})", track.name, track.uri);
                self.transport.play(&track.uri).await
            }
            None => self.transport.resume().await,
        };

        self.settle(result, rollback, "play", |shared| {
            if shared.generations.transport == generation {
                shared.state.is_playing = true;
                shared.state.status = PlaybackStatus::Playing;
            }
        })
    }

    /// Pauses playback. The flag flips immediately; a failure restores it.
    pub async fn pause(&self) -> Result<(), TransportError> {
        let mut rollback = Rollback::default();
        {
            let mut shared = self.lock();
            shared.claim_transport(&mut rollback);
            shared.state.is_playing = false;
            shared.state.status = if shared.state.track.is_some() {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Idle
            };
            shared.begin_intent();
            self.commit(&shared);
        }

        let result = self.transport.pause().await;
        self.settle(result, rollback, "pause", |_| {})
    }

    /// Skips forward. The new track is only known after the next poll.
    pub async fn next(&self) -> Result<(), TransportError> {
        self.lock().begin_intent();
        let result = self.transport.next().await;
        self.settle(result, Rollback::default(), "skip to next track", |_| {})
    }

    /// Skips backward. The new track is only known after the next poll.
    pub async fn previous(&self) -> Result<(), TransportError> {
        self.lock().begin_intent();
        let result = self.transport.previous().await;
        self.settle(result, Rollback::default(), "skip to previous track", |_| {})
    }

    /// Seeks to `position_ms`, clamped to the track duration when one is known.
    pub async fn set_progress(&self, position_ms: u64) -> Result<(), TransportError> {
        let mut rollback = Rollback::default();
        let position_ms = {
            let mut shared = self.lock();
            let position_ms = match shared.state.duration_ms {
                0 => position_ms,
                duration_ms => position_ms.min(duration_ms),
            };
            shared.claim_progress(&mut rollback);
            shared.state.progress_ms = position_ms;
            shared.begin_intent();
            self.commit(&shared);
            position_ms
        };

        let result = self.transport.seek(position_ms).await;
        self.settle(result, rollback, "seek to position", |_| {})
    }

    /// Sets the volume. Values outside `0..=100` are clamped before dispatch.
    pub async fn set_player_volume(&self, percent: i32) -> Result<(), TransportError> {
        let volume = percent.clamp(0, 100) as u8;
        let mut rollback = Rollback::default();
        {
            let mut shared = self.lock();
            shared.claim_volume(&mut rollback);
            shared.state.volume = volume;
            shared.begin_intent();
            self.commit(&shared);
        }

        let result = self.transport.set_volume(volume).await;
        self.settle(result, rollback, "set volume", |_| {})
    }

    pub async fn toggle_playback(&self) -> Result<(), TransportError> {
        let is_playing = self.lock().state.is_playing;
        if is_playing {
            self.pause().await
        } else {
            self.play(None).await
        }
    }

    fn settle(
        &self,
        result: Result<(), TransportError>,
        rollback: Rollback,
        action: &str,
        on_success: impl FnOnce(&mut Shared),
    ) -> Result<(), TransportError> {
        let mut shared = self.lock();
        shared.in_flight = shared.in_flight.saturating_sub(1);
        match &result {
            Ok(()) => {
                on_success(&mut *shared);
                if let Some(claim) = rollback.transport {
                    shared.transport_succeeded(claim);
                }
            }
            Err(e) => {
                warning!("Failed to {}: {}", action, e);
                shared.roll_back(rollback);
                shared.last_error = Some(format!("Failed to {}: {}", action, e));
                if e.requires_login() {
                    shared.sign_out();
                }
            }
        }
        self.commit(&shared);
        result
    }

    /// Fetches the remote state once and merges it into the canonical state.
    pub async fn poll_once(&self) -> Result<PollOutcome, GatewayError> {
        if !self.tokens.is_authenticated().await {
            return Ok(PollOutcome::Skipped);
        }

        let (issued_seq, issued_in_flight) = {
            let shared = self.lock();
            (shared.intent_seq, shared.in_flight)
        };

        let remote = match self.source.get_state().await {
            Ok(remote) => remote,
            Err(e) => {
                warning!("Failed to get player state: {}", e);
                let mut shared = self.lock();
                shared.last_error = Some(format!("Failed to get player state: {}", e));
                if e.requires_login() {
                    shared.sign_out();
                    self.commit(&shared);
                }
                return Err(e);
            }
        };

        let mut shared = self.lock();
        if shared.intent_seq != issued_seq || issued_in_flight > 0 || shared.in_flight > 0 {
            return Ok(PollOutcome::Stale);
        }

        if remote == RemoteState::NoSession {
            info!("No active player state");
        }
        shared.apply_remote(remote);
        self.commit(&shared);
        Ok(PollOutcome::Applied)
    }

    /// Advances local progress by `elapsed_ms` while playing.
    ///
    /// Moving past the duration resets progress to 0: the track is assumed to
    /// have ended or looped until the next poll says otherwise.
    pub fn tick(&self, elapsed_ms: u64) {
        let mut shared = self.lock();
        if !shared.state.is_playing {
            return;
        }

        let next = shared.state.progress_ms.saturating_add(elapsed_ms);
        shared.state.progress_ms = if next > shared.state.duration_ms {
            0
        } else {
            next
        };
        self.commit(&shared);
    }

    /// Starts the background poll (only with a stored session) and the ticker.
    ///
    /// Calling it again restarts both tasks.
    pub async fn start(self: &Arc<Self>) {
        self.shutdown();
        let authenticated = self.tokens.is_authenticated().await;

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if authenticated {
            info!("Starting player state polling");
            tasks.push(tokio::spawn(poll_loop(
                Arc::downgrade(self),
                self.settings.poll_interval,
            )));
        } else {
            info!("No Spotify token found, skipping player state polling");
        }
        tasks.push(tokio::spawn(tick_loop(
            Arc::downgrade(self),
            self.playing_tx.subscribe(),
            self.settings.tick_interval,
        )));
    }

    /// Number of background tasks still running.
    pub fn running_tasks(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    /// Stops every background task.
    pub fn shutdown(&self) {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        for task in self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
    }
}

async fn poll_loop(coordinator: Weak<PlaybackCoordinator>, period: Duration) {
    let mut interval = interval_at(Instant::now(), period);
    loop {
        interval.tick().await;
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        if let Err(e) = coordinator.poll_once().await {
            if e.requires_login() {
                info!("Session ended, stopping player state polling");
                break;
            }
        }
    }
}

async fn tick_loop(
    coordinator: Weak<PlaybackCoordinator>,
    mut playing: watch::Receiver<bool>,
    period: Duration,
) {
    let elapsed_ms = period.as_millis() as u64;
    loop {
        while !*playing.borrow_and_update() {
            if playing.changed().await.is_err() {
                return;
            }
        }

        let mut interval = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(coordinator) = coordinator.upgrade() else {
                        return;
                    };
                    coordinator.tick(elapsed_ms);
                }
                changed = playing.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*playing.borrow_and_update() {
                        break;
                    }
                }
            }
        }
    }
}
