use std::collections::HashMap;

use axum::{Extension, extract::Query, response::Redirect};

use crate::{server::AppState, utils, warning};

/// Completes the authorization-code flow.
///
/// The `state` parameter must be one issued by the auth-URL endpoint and not
/// yet used, so a bare `?code=` is rejected without contacting Spotify.
/// On success the browser is sent to the home view with the tokens in the
/// query, on failure to the error view.
pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(state): Extension<AppState>,
) -> Redirect {
    if let Some(error) = params.get("error") {
        return error_redirect(&format!("Authorization denied: {}", error));
    }

    let Some(code) = params.get("code") else {
        return error_redirect("Missing authorization code");
    };

    match params.get("state") {
        Some(oauth_state) if state.complete_authorization(oauth_state) => {}
        _ => return error_redirect("Invalid or expired authorization state"),
    }

    let redirect_uri = match state.accounts.settings().redirect_uri() {
        Ok(uri) => uri.to_string(),
        Err(e) => return error_redirect(&e.to_string()),
    };

    match state.accounts.exchange_code(code, &redirect_uri).await {
        Ok(token) => {
            let expires_in = token.expires_in.to_string();
            let query = utils::query_string(&[
                ("access_token", token.access_token.as_str()),
                ("refresh_token", token.refresh_token.as_deref().unwrap_or_default()),
                ("expires_in", expires_in.as_str()),
            ]);
            Redirect::to(&format!("/?{}", query))
        }
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            error_redirect(&format!("Failed to exchange code for token: {}", e))
        }
    }
}

fn error_redirect(message: &str) -> Redirect {
    Redirect::to(&format!(
        "/error?{}",
        utils::query_string(&[("message", message)])
    ))
}
