use std::sync::Arc;

use crate::{error, management::TokenStore, spotify, success};

pub async fn auth() {
    let tokens = super::open_store().await;
    if let Err(e) = spotify::auth::login(Arc::clone(&tokens)).await {
        error!("Authentication failed: {}", e);
    }
}

pub async fn logout() {
    let tokens: Arc<TokenStore> = super::open_store().await;
    match tokens.clear().await {
        Ok(()) => success!("Logged out."),
        Err(e) => error!("Failed to clear session: {}", e),
    }
}
