use crate::{
    error,
    server::{AppState, start_api_server},
    spotify::auth::SpotifyAccounts,
    warning,
};

pub async fn serve() {
    let accounts = SpotifyAccounts::from_env();
    let settings = accounts.settings();
    if let Err(e) = settings
        .client_id()
        .and(settings.client_secret())
        .and(settings.redirect_uri())
    {
        warning!("Login will not work until configured: {}", e);
    }

    let state = AppState::new(accounts, super::open_store().await);
    if let Err(e) = start_api_server(state).await {
        error!("Relay server failed: {}", e);
    }
}
