use axum::{Extension, body::Bytes, http::StatusCode, response::Json};
use serde::de::DeserializeOwned;

use crate::{
    server::AppState,
    types::{AuthUrlResponse, MessageResponse, RefreshRequest, TokenRequest, TokenResponse},
    warning,
};

type ApiError = (StatusCode, Json<MessageResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
}

/// Parses an optional JSON body; an empty body yields the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Request body must be valid JSON"))
}

pub async fn auth_url(
    Extension(state): Extension<AppState>,
) -> Result<Json<AuthUrlResponse>, ApiError> {
    match state.begin_authorization() {
        Ok(auth_url) => Ok(Json(AuthUrlResponse { auth_url })),
        Err(e) => {
            warning!("Error getting auth URL: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to get authorization URL: {}", e),
            ))
        }
    }
}

pub async fn token(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let request: TokenRequest = parse_body(&body)?;
    let (Some(code), Some(redirect_uri)) = (request.code, request.redirect_uri) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Code and redirectUri are required",
        ));
    };

    match state.accounts.exchange_code(&code, &redirect_uri).await {
        Ok(token) => Ok(Json(token)),
        Err(e) => {
            warning!("Error exchanging code for token: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to exchange code for token",
            ))
        }
    }
}

/// Refreshes with the token from the body, or with the session's refresh
/// token when the body carries none. Only the session path updates the session.
pub async fn refresh(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let request: RefreshRequest = parse_body(&body)?;
    let (refresh_token, from_session) = match request.refresh_token {
        Some(token) => (token, false),
        None => match state.tokens.refresh_token().await {
            Some(token) => (token, true),
            None => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Refresh token is required",
                ));
            }
        },
    };

    let token = match state.accounts.refresh_token(&refresh_token).await {
        Ok(token) => token,
        Err(e) => {
            warning!("Error refreshing token: {}", e);
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to refresh token",
            ));
        }
    };

    if from_session {
        if let Err(e) = state
            .tokens
            .store(
                &token.access_token,
                token.refresh_token.as_deref(),
                token.expires_in,
            )
            .await
        {
            warning!("Failed to update session after refresh: {}", e);
        }
    }

    Ok(Json(token))
}
