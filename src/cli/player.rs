use tabled::{Table, settings::Style};

use crate::{
    error,
    playback::{PlaybackState, TransportError},
    success,
    types::{DeviceTableRow, NowPlayingTableRow},
    utils, warning,
};

/// One-shot transport intents issued from the command line.
#[derive(Debug, Clone)]
pub enum PlayerAction {
    Play(String),
    Resume,
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(String),
    Volume(i32),
}

pub async fn status(bridge: bool) {
    let player = super::build_player(bridge).await;
    super::prime(&player).await;
    print_state(&player.coordinator.snapshot());

    match player.gateway.devices().await {
        Ok(devices) if !devices.is_empty() => {
            let rows: Vec<DeviceTableRow> = devices
                .into_iter()
                .map(|d| DeviceTableRow {
                    name: d.name,
                    device_type: d.device_type,
                    active: if d.is_active { "yes" } else { "" }.to_string(),
                    volume: d
                        .volume_percent
                        .map(|v| format!("{}%", v))
                        .unwrap_or_default(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
        Ok(_) => warning!("No devices available."),
        Err(e) => warning!("Failed to list devices: {}", e),
    }
}

pub async fn run(action: PlayerAction, bridge: bool) {
    let player = super::build_player(bridge).await;
    super::prime(&player).await;
    let coordinator = &player.coordinator;

    let result = match action {
        PlayerAction::Play(reference) => {
            let Some(uri) = utils::parse_track_uri(&reference) else {
                error!("Not a track URI, link or id: {}", reference);
            };
            let id = uri.trim_start_matches("spotify:track:");
            match player.gateway.track(id).await {
                Ok(track) => coordinator.play(Some(track)).await,
                Err(e) => Err(TransportError::from(e)),
            }
        }
        PlayerAction::Resume => coordinator.play(None).await,
        PlayerAction::Pause => coordinator.pause().await,
        PlayerAction::Toggle => coordinator.toggle_playback().await,
        PlayerAction::Next => coordinator.next().await,
        PlayerAction::Previous => coordinator.previous().await,
        PlayerAction::Seek(position) => match utils::parse_position(&position) {
            Some(ms) => coordinator.set_progress(ms).await,
            None => error!("Invalid position '{}'. Use seconds or m:ss.", position),
        },
        PlayerAction::Volume(percent) => coordinator.set_player_volume(percent).await,
    };

    match result {
        Ok(()) => {
            match player.selector.last_path() {
                Some(path) => success!("Done via {}.", path),
                None => success!("Nothing to do."),
            }
            print_state(&coordinator.snapshot());
        }
        Err(e) => super::report(e),
    }
}

pub fn print_state(state: &PlaybackState) {
    let Some(track) = &state.track else {
        warning!("Nothing is playing.");
        return;
    };

    let rows = vec![
        NowPlayingTableRow {
            field: "Track".to_string(),
            value: track.name.clone(),
        },
        NowPlayingTableRow {
            field: "Artists".to_string(),
            value: track.artist_names(),
        },
        NowPlayingTableRow {
            field: "Album".to_string(),
            value: track.album.name.clone(),
        },
        NowPlayingTableRow {
            field: "Progress".to_string(),
            value: format!(
                "{} / {}",
                utils::format_duration(state.progress_ms),
                utils::format_duration(state.duration_ms)
            ),
        },
        NowPlayingTableRow {
            field: "State".to_string(),
            value: format!("{:?}", state.status),
        },
        NowPlayingTableRow {
            field: "Volume".to_string(),
            value: format!("{}%", state.volume),
        },
    ];

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}
