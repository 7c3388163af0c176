#![allow(dead_code)]

use axum::Router;
use musux::types::{AlbumRef, ArtistRef, Track};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn track(id: &str, duration_ms: u64) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        artists: vec![ArtistRef {
            id: format!("{}_artist", id),
            name: "Test Artist".to_string(),
        }],
        album: AlbumRef {
            id: format!("{}_album", id),
            name: "Test Album".to_string(),
            images: Vec::new(),
        },
        duration_ms,
        uri: format!("spotify:track:{}", id),
    }
}
