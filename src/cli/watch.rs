use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    error, info,
    playback::{PlaybackState, PlaybackStatus},
    utils, warning,
};

/// Follows playback live until Ctrl-C: remote poll plus local progress ticker.
pub async fn watch(bridge: bool) {
    let player = super::build_player(bridge).await;
    let coordinator = player.coordinator.clone();
    coordinator.start().await;

    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{prefix} [{bar:40.green/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);

    let mut updates = coordinator.subscribe();
    render(&bar, &updates.borrow_and_update().clone());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.status == PlaybackStatus::SignedOut {
                    coordinator.shutdown();
                    bar.finish_and_clear();
                    error!("Your Spotify session has ended. Run `musux auth` to log in again.");
                }
                render(&bar, &state);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.shutdown();
    bar.finish_and_clear();
    if let Some(e) = coordinator.last_error() {
        warning!("Last error: {}", e);
    }
    info!("Stopped watching.");
}

fn render(bar: &ProgressBar, state: &PlaybackState) {
    match &state.track {
        Some(track) => {
            bar.set_length(state.duration_ms.max(1));
            bar.set_position(state.progress_ms);
            bar.set_prefix(if state.is_playing { "▶" } else { "⏸" });
            bar.set_message(format!(
                "{} - {}  {} / {}  vol {}%",
                track.name,
                track.artist_names(),
                utils::format_duration(state.progress_ms),
                utils::format_duration(state.duration_ms),
                state.volume
            ));
        }
        None => {
            bar.set_length(1);
            bar.set_position(0);
            bar.set_prefix("■");
            bar.set_message("Nothing is playing");
        }
    }
}
