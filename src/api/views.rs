use std::collections::HashMap;

use axum::{
    Extension,
    extract::Query,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::{server::AppState, utils, warning};

/// Home view. When reached from the callback redirect it persists the tokens
/// carried in the query into the session store.
pub async fn home(
    Query(params): Query<HashMap<String, String>>,
    Extension(state): Extension<AppState>,
) -> Response {
    let Some(access_token) = params.get("access_token").filter(|t| !t.is_empty()) else {
        let status = if state.tokens.is_authenticated().await {
            "<p>Logged in.</p>"
        } else {
            "<p>Not logged in. Run <code>musux auth</code> to connect your Spotify account.</p>"
        };
        return Html(format!("<h2>MusuX</h2>{}", status)).into_response();
    };

    let refresh_token = params
        .get("refresh_token")
        .map(String::as_str)
        .filter(|t| !t.is_empty());
    let expires_in = params
        .get("expires_in")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(3600);

    match state
        .tokens
        .store(access_token, refresh_token, expires_in)
        .await
    {
        Ok(_) => Html("<h2>Authentication successful.</h2><p>Close this browser window.</p>")
            .into_response(),
        Err(e) => {
            warning!("Failed to persist session: {}", e);
            Redirect::to(&format!(
                "/error?{}",
                utils::query_string(&[("message", "Failed to save the session")])
            ))
            .into_response()
        }
    }
}

pub async fn error_view(Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let message = params
        .get("message")
        .map(String::as_str)
        .unwrap_or("Something went wrong");

    Html(format!(
        "<h2>Login failed</h2><p>{}</p><p><a href=\"/\">Back to home</a></p>",
        utils::escape_html(message)
    ))
}
