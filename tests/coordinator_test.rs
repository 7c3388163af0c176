mod common;

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use musux::{
    config::PlayerSettings,
    management::TokenStore,
    playback::{
        PlaybackCoordinator, PlaybackStatus, PlaybackTransport, PollOutcome, RemoteStateSource,
        TransportCommand, TransportError,
    },
    spotify::player::GatewayError,
    types::{RemoteSnapshot, RemoteState},
};
use tokio::sync::oneshot;

type Gate = oneshot::Sender<Result<(), TransportError>>;

/// Records every command. A queued gate holds the next command open until
/// it is released with the outcome to report.
#[derive(Default)]
struct FakeTransport {
    calls: Mutex<Vec<TransportCommand>>,
    gates: Mutex<VecDeque<oneshot::Receiver<Result<(), TransportError>>>>,
}

impl FakeTransport {
    fn gate(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    fn calls(&self) -> Vec<TransportCommand> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, command: TransportCommand) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(command);
        let gate = self.gates.lock().unwrap().pop_front();
        match gate {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlaybackTransport for FakeTransport {
    async fn play(&self, uri: &str) -> Result<(), TransportError> {
        self.run(TransportCommand::Play(uri.to_string())).await
    }

    async fn resume(&self) -> Result<(), TransportError> {
        self.run(TransportCommand::Resume).await
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.run(TransportCommand::Pause).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), TransportError> {
        self.run(TransportCommand::Seek(position_ms)).await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), TransportError> {
        self.run(TransportCommand::Volume(percent)).await
    }

    async fn next(&self) -> Result<(), TransportError> {
        self.run(TransportCommand::Next).await
    }

    async fn previous(&self) -> Result<(), TransportError> {
        self.run(TransportCommand::Previous).await
    }
}

#[derive(Clone)]
enum Reply {
    State(RemoteState),
    ServiceError,
    Reauth,
}

struct FakeSource {
    reply: Mutex<Reply>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn gate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl RemoteStateSource for FakeSource {
    async fn get_state(&self) -> Result<RemoteState, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        match self.reply.lock().unwrap().clone() {
            Reply::State(state) => Ok(state),
            Reply::ServiceError => Err(GatewayError::Service {
                status: 502,
                message: "Bad gateway".to_string(),
            }),
            Reply::Reauth => Err(GatewayError::ReauthRequired("invalid_grant".to_string())),
        }
    }
}

fn device_error(message: &str) -> Result<(), TransportError> {
    Err(TransportError::Device(message.to_string()))
}

fn session_ended() -> Result<(), TransportError> {
    Err(TransportError::Gateway(GatewayError::ReauthRequired(
        "invalid_grant".to_string(),
    )))
}

fn settings() -> PlayerSettings {
    PlayerSettings {
        device_name: "Test Device".to_string(),
        poll_interval: Duration::from_millis(20),
        tick_interval: Duration::from_millis(10),
    }
}

struct Harness {
    coordinator: Arc<PlaybackCoordinator>,
    transport: Arc<FakeTransport>,
    source: Arc<FakeSource>,
}

async fn harness(reply: Reply, authenticated: bool) -> Harness {
    let transport = Arc::new(FakeTransport::default());
    let source = FakeSource::new(reply);
    let tokens = Arc::new(TokenStore::ephemeral());
    if authenticated {
        tokens.store("access", Some("refresh"), 3600).await.unwrap();
    }
    let coordinator =
        PlaybackCoordinator::new(transport.clone(), source.clone(), tokens, settings());
    Harness {
        coordinator,
        transport,
        source,
    }
}

async fn wait_for_calls(transport: &FakeTransport, count: usize) {
    while transport.calls.lock().unwrap().len() < count {
        tokio::task::yield_now().await;
    }
}

fn active(id: &str, duration_ms: u64, progress_ms: u64, is_playing: bool) -> RemoteState {
    RemoteState::Active(RemoteSnapshot {
        track: common::track(id, duration_ms),
        is_playing,
        progress_ms,
        volume_percent: Some(55),
    })
}

#[tokio::test]
async fn test_initial_state() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let state = h.coordinator.snapshot();

    assert_eq!(state.track, None);
    assert!(!state.is_playing);
    assert_eq!(state.volume, 70);
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn test_play_sets_track_and_playing() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let track = common::track("a", 180_000);

    h.coordinator.play(Some(track.clone())).await.unwrap();

    let state = h.coordinator.snapshot();
    assert_eq!(state.track, Some(track.clone()));
    assert_eq!(state.duration_ms, 180_000);
    assert_eq!(state.progress_ms, 0);
    assert!(state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(h.transport.calls(), vec![TransportCommand::Play(track.uri)]);
}

#[tokio::test]
async fn test_play_is_loading_until_settled() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("a", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    let state = h.coordinator.snapshot();
    assert_eq!(state.status, PlaybackStatus::Loading);
    assert!(!state.is_playing);
    assert_eq!(state.track.map(|t| t.id), Some("a".to_string()));

    gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();
    assert_eq!(h.coordinator.snapshot().status, PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_pause_wins_when_play_settles_last() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let play_gate = h.transport.gate();
    let pause_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("a", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    let coordinator = h.coordinator.clone();
    let pause = tokio::spawn(async move { coordinator.pause().await });
    wait_for_calls(&h.transport, 2).await;
    assert!(!h.coordinator.snapshot().is_playing);

    pause_gate.send(Ok(())).unwrap();
    pause.await.unwrap().unwrap();
    play_gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();

    let state = h.coordinator.snapshot();
    assert!(!state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Paused);
}

#[tokio::test]
async fn test_pause_wins_when_play_settles_first() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let play_gate = h.transport.gate();
    let pause_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("a", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    let coordinator = h.coordinator.clone();
    let pause = tokio::spawn(async move { coordinator.pause().await });
    wait_for_calls(&h.transport, 2).await;

    play_gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();
    assert!(!h.coordinator.snapshot().is_playing);

    pause_gate.send(Ok(())).unwrap();
    pause.await.unwrap().unwrap();

    let state = h.coordinator.snapshot();
    assert!(!state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Paused);
}

#[tokio::test]
async fn test_failed_pause_rolls_back() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 1000))).await.unwrap();

    let gate = h.transport.gate();
    gate.send(device_error("device went away")).unwrap();
    let result = h.coordinator.pause().await;

    assert!(result.is_err());
    let state = h.coordinator.snapshot();
    assert!(state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Playing);
    let error = h.coordinator.last_error().unwrap();
    assert!(error.contains("pause"));
    assert!(error.contains("device went away"));
}

#[tokio::test]
async fn test_failed_play_restores_previous_track() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let first = common::track("a", 1000);
    h.coordinator.play(Some(first.clone())).await.unwrap();
    h.coordinator.set_progress(500).await.unwrap();

    let gate = h.transport.gate();
    gate.send(device_error("rejected")).unwrap();
    assert!(h.coordinator.play(Some(common::track("b", 2000))).await.is_err());

    let state = h.coordinator.snapshot();
    assert_eq!(state.track, Some(first));
    assert_eq!(state.duration_ms, 1000);
    assert_eq!(state.progress_ms, 500);
    assert!(state.is_playing);
}

#[tokio::test]
async fn test_stale_failure_does_not_undo_newer_intent() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let first_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let first = tokio::spawn(async move { coordinator.set_player_volume(40).await });
    wait_for_calls(&h.transport, 1).await;

    h.coordinator.set_player_volume(60).await.unwrap();

    first_gate.send(device_error("timeout")).unwrap();
    assert!(first.await.unwrap().is_err());

    assert_eq!(h.coordinator.snapshot().volume, 60);
}

#[tokio::test]
async fn test_failed_pause_after_play_settled_keeps_playing() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let play_gate = h.transport.gate();
    let pause_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("a", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    let coordinator = h.coordinator.clone();
    let pause = tokio::spawn(async move { coordinator.pause().await });
    wait_for_calls(&h.transport, 2).await;

    play_gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();
    pause_gate.send(device_error("device went away")).unwrap();
    assert!(pause.await.unwrap().is_err());

    let state = h.coordinator.snapshot();
    assert!(state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(state.track.map(|t| t.id), Some("a".to_string()));
}

#[tokio::test]
async fn test_failed_pause_before_play_settles_waits_for_play() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let play_gate = h.transport.gate();
    let pause_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("a", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    let coordinator = h.coordinator.clone();
    let pause = tokio::spawn(async move { coordinator.pause().await });
    wait_for_calls(&h.transport, 2).await;

    pause_gate.send(device_error("device went away")).unwrap();
    assert!(pause.await.unwrap().is_err());
    assert_eq!(h.coordinator.snapshot().status, PlaybackStatus::Loading);

    play_gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();

    let state = h.coordinator.snapshot();
    assert!(state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_failed_play_and_pause_restore_state_before_both() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 1000))).await.unwrap();
    h.coordinator.pause().await.unwrap();

    let play_gate = h.transport.gate();
    let pause_gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("b", 2000))).await });
    wait_for_calls(&h.transport, 3).await;

    let coordinator = h.coordinator.clone();
    let pause = tokio::spawn(async move { coordinator.pause().await });
    wait_for_calls(&h.transport, 4).await;

    play_gate.send(device_error("rejected")).unwrap();
    assert!(play.await.unwrap().is_err());
    pause_gate.send(device_error("rejected")).unwrap();
    assert!(pause.await.unwrap().is_err());

    let state = h.coordinator.snapshot();
    assert_eq!(state.track.map(|t| t.id), Some("a".to_string()));
    assert_eq!(state.duration_ms, 1000);
    assert!(!state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Paused);
}

#[tokio::test]
async fn test_play_without_track_is_noop() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;

    h.coordinator.play(None).await.unwrap();

    assert!(h.transport.calls().is_empty());
    assert_eq!(h.coordinator.snapshot().status, PlaybackStatus::Idle);
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn test_toggle_pauses_and_resumes() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let track = common::track("a", 1000);
    h.coordinator.play(Some(track.clone())).await.unwrap();

    h.coordinator.toggle_playback().await.unwrap();
    assert!(!h.coordinator.snapshot().is_playing);

    h.coordinator.toggle_playback().await.unwrap();
    assert!(h.coordinator.snapshot().is_playing);

    assert_eq!(
        h.transport.calls(),
        vec![
            TransportCommand::Play(track.uri),
            TransportCommand::Pause,
            TransportCommand::Resume,
        ]
    );
}

#[tokio::test]
async fn test_skip_has_no_optimistic_effect() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let track = common::track("a", 1000);
    h.coordinator.play(Some(track.clone())).await.unwrap();

    h.coordinator.next().await.unwrap();
    h.coordinator.previous().await.unwrap();

    assert_eq!(h.coordinator.snapshot().track, Some(track));
    assert_eq!(
        h.transport.calls()[1..],
        [TransportCommand::Next, TransportCommand::Previous]
    );
}

#[tokio::test]
async fn test_set_progress_is_visible_before_settle() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();
    let gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let seek = tokio::spawn(async move { coordinator.set_progress(30_000).await });
    wait_for_calls(&h.transport, 2).await;

    assert_eq!(h.coordinator.snapshot().progress_ms, 30_000);

    gate.send(Ok(())).unwrap();
    seek.await.unwrap().unwrap();
    assert_eq!(h.coordinator.snapshot().progress_ms, 30_000);
}

#[tokio::test]
async fn test_set_progress_clamps_to_duration() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();

    h.coordinator.set_progress(999_999).await.unwrap();

    assert_eq!(h.coordinator.snapshot().progress_ms, 180_000);
    assert_eq!(h.transport.calls()[1], TransportCommand::Seek(180_000));
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;

    h.coordinator.set_player_volume(250).await.unwrap();
    assert_eq!(h.coordinator.snapshot().volume, 100);

    h.coordinator.set_player_volume(-5).await.unwrap();
    assert_eq!(h.coordinator.snapshot().volume, 0);

    assert_eq!(
        h.transport.calls(),
        vec![TransportCommand::Volume(100), TransportCommand::Volume(0)]
    );
}

#[tokio::test]
async fn test_tick_advances_and_wraps() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();
    h.coordinator.set_progress(179_000).await.unwrap();

    h.coordinator.tick(500);
    assert_eq!(h.coordinator.snapshot().progress_ms, 179_500);

    h.coordinator.tick(1000);
    assert_eq!(h.coordinator.snapshot().progress_ms, 0);
}

#[tokio::test]
async fn test_tick_ignored_while_paused() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();
    h.coordinator.set_progress(10_000).await.unwrap();
    h.coordinator.pause().await.unwrap();

    h.coordinator.tick(1000);

    assert_eq!(h.coordinator.snapshot().progress_ms, 10_000);
}

#[tokio::test]
async fn test_poll_without_token_is_skipped() {
    let h = harness(Reply::State(active("a", 1000, 0, true)), false).await;

    assert_eq!(h.coordinator.poll_once().await.unwrap(), PollOutcome::Skipped);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_poll_applies_remote_state() {
    let h = harness(Reply::State(active("remote", 200_000, 90_000, true)), true).await;

    assert_eq!(h.coordinator.poll_once().await.unwrap(), PollOutcome::Applied);

    let state = h.coordinator.snapshot();
    assert_eq!(state.track.map(|t| t.id), Some("remote".to_string()));
    assert_eq!(state.progress_ms, 90_000);
    assert_eq!(state.duration_ms, 200_000);
    assert_eq!(state.volume, 55);
    assert!(state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Playing);
}

#[tokio::test]
async fn test_no_session_resets_to_idle() {
    let h = harness(Reply::State(RemoteState::NoSession), true).await;
    h.coordinator.play(Some(common::track("a", 1000))).await.unwrap();
    h.coordinator.set_player_volume(30).await.unwrap();

    assert_eq!(h.coordinator.poll_once().await.unwrap(), PollOutcome::Applied);

    let state = h.coordinator.snapshot();
    assert_eq!(state.track, None);
    assert!(!state.is_playing);
    assert_eq!(state.progress_ms, 0);
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert_eq!(state.volume, 30);
    assert_eq!(h.coordinator.last_error(), None);
}

#[tokio::test]
async fn test_poll_during_in_flight_intent_is_stale() {
    let h = harness(Reply::State(RemoteState::NoSession), true).await;
    let gate = h.transport.gate();

    let coordinator = h.coordinator.clone();
    let play = tokio::spawn(async move { coordinator.play(Some(common::track("local", 1000))).await });
    wait_for_calls(&h.transport, 1).await;

    assert_eq!(h.coordinator.poll_once().await.unwrap(), PollOutcome::Stale);
    assert_eq!(
        h.coordinator.snapshot().track.map(|t| t.id),
        Some("local".to_string())
    );

    gate.send(Ok(())).unwrap();
    play.await.unwrap().unwrap();
    assert!(h.coordinator.snapshot().is_playing);
}

#[tokio::test]
async fn test_intent_issued_during_poll_makes_it_stale() {
    let h = harness(Reply::State(active("remote", 1000, 0, false)), true).await;
    let release = h.source.gate();

    let coordinator = h.coordinator.clone();
    let poll = tokio::spawn(async move { coordinator.poll_once().await });
    while h.source.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    h.coordinator.set_player_volume(20).await.unwrap();
    release.send(()).unwrap();

    assert_eq!(poll.await.unwrap().unwrap(), PollOutcome::Stale);
    let state = h.coordinator.snapshot();
    assert_eq!(state.volume, 20);
    assert_eq!(state.track, None);
}

#[tokio::test]
async fn test_poll_after_settle_reconciles() {
    let h = harness(Reply::State(active("remote", 1000, 400, false)), true).await;
    h.coordinator.play(Some(common::track("local", 1000))).await.unwrap();

    assert_eq!(h.coordinator.poll_once().await.unwrap(), PollOutcome::Applied);

    let state = h.coordinator.snapshot();
    assert_eq!(state.track.map(|t| t.id), Some("remote".to_string()));
    assert!(!state.is_playing);
    assert_eq!(state.status, PlaybackStatus::Paused);
}

#[tokio::test]
async fn test_poll_failure_records_error() {
    let h = harness(Reply::ServiceError, true).await;

    let err = h.coordinator.poll_once().await.unwrap_err();

    assert!(!err.requires_login());
    assert!(h.coordinator.last_error().unwrap().contains("Bad gateway"));
}

#[tokio::test]
async fn test_subscribers_see_updates() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    let mut updates = h.coordinator.subscribe();

    h.coordinator.set_player_volume(42).await.unwrap();

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().volume, 42);
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let h = harness(Reply::State(RemoteState::NoSession), true).await;

    h.coordinator.start().await;
    assert_eq!(h.coordinator.running_tasks(), 2);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(h.source.calls.load(Ordering::SeqCst) >= 1);

    h.coordinator.shutdown();
    assert_eq!(h.coordinator.running_tasks(), 0);

    let calls = h.source.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.source.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_start_without_token_skips_polling() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;

    h.coordinator.start().await;
    assert_eq!(h.coordinator.running_tasks(), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
    h.coordinator.shutdown();
}

#[tokio::test]
async fn test_polling_stops_when_session_ends() {
    let h = harness(Reply::Reauth, true).await;

    h.coordinator.start().await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.coordinator.running_tasks(), 1);
    h.coordinator.shutdown();
}

#[tokio::test]
async fn test_session_end_during_poll_signs_out() {
    let h = harness(Reply::Reauth, true).await;
    h.coordinator.play(Some(common::track("a", 1000))).await.unwrap();
    h.coordinator.set_player_volume(35).await.unwrap();
    let mut updates = h.coordinator.subscribe();
    updates.borrow_and_update();

    let err = h.coordinator.poll_once().await.unwrap_err();

    assert!(err.requires_login());
    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update().clone();
    assert_eq!(state.status, PlaybackStatus::SignedOut);
    assert_eq!(state.track, None);
    assert!(!state.is_playing);
    assert_eq!(state.volume, 35);
}

#[tokio::test]
async fn test_session_end_during_intent_signs_out() {
    let h = harness(Reply::State(RemoteState::NoSession), true).await;
    h.coordinator.play(Some(common::track("a", 1000))).await.unwrap();
    let mut updates = h.coordinator.subscribe();
    updates.borrow_and_update();

    let gate = h.transport.gate();
    gate.send(session_ended()).unwrap();
    let err = h.coordinator.pause().await.unwrap_err();

    assert!(err.requires_login());
    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update().clone();
    assert_eq!(state.status, PlaybackStatus::SignedOut);
    assert_eq!(state.track, None);
    assert!(!state.is_playing);
}

#[tokio::test]
async fn test_ticker_stops_after_sign_out() {
    let h = harness(Reply::Reauth, true).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();

    h.coordinator.start().await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let state = h.coordinator.snapshot();
    assert_eq!(state.status, PlaybackStatus::SignedOut);
    assert_eq!(state.progress_ms, 0);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(h.coordinator.snapshot().progress_ms, 0);
    h.coordinator.shutdown();
}

#[tokio::test]
async fn test_ticker_advances_progress_while_playing() {
    let h = harness(Reply::State(RemoteState::NoSession), false).await;
    h.coordinator.play(Some(common::track("a", 180_000))).await.unwrap();

    h.coordinator.start().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(h.coordinator.snapshot().progress_ms > 0);

    h.coordinator.pause().await.unwrap();
    let frozen = h.coordinator.snapshot().progress_ms;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(h.coordinator.snapshot().progress_ms, frozen);

    h.coordinator.shutdown();
}
