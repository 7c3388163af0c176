use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{config, types::AuthSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable holder of the current [`AuthSession`].
///
/// The session is cached in memory and written through to a JSON file, so it
/// survives restarts. Expiry is metadata only: the store never evicts an
/// expired session, callers decide what to do with it.
///
/// One store is shared (behind an `Arc`) by every consumer that needs the
/// tokens; there is no other read path.
pub struct TokenStore {
    path: PathBuf,
    session: Mutex<Option<AuthSession>>,
}

impl TokenStore {
    /// Opens the store at the default location in the local data directory.
    pub async fn open_default() -> Result<Self, StoreError> {
        Self::open(config::session_path()).await
    }

    /// Opens the store at `path`, loading a previously persisted session if present.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let session = match async_fs::read_to_string(&path).await {
            Ok(content) => Some(serde_json::from_str::<AuthSession>(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(Self {
            path,
            session: Mutex::new(session),
        })
    }

    /// An in-memory store that never touches the filesystem.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            session: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Whether the stored session expires within `margin_secs` from now.
    /// Returns `false` when nothing is stored.
    pub async fn expires_within(&self, margin_secs: i64) -> bool {
        match self.session.lock().await.as_ref() {
            Some(s) => {
                Utc::now()
                    .timestamp_millis()
                    .saturating_add(margin_secs.saturating_mul(1000))
                    >= s.expires_at
            }
            None => false,
        }
    }

    /// Replaces the session. A `None` refresh token keeps the stored one.
    pub async fn store(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in_secs: u64,
    ) -> Result<AuthSession, StoreError> {
        let mut lock = self.session.lock().await;
        let refresh_token = refresh_token
            .map(str::to_string)
            .or_else(|| lock.as_ref().and_then(|s| s.refresh_token.clone()));

        let session = AuthSession {
            access_token: access_token.to_string(),
            refresh_token,
            expires_at: Utc::now()
                .timestamp_millis()
                .saturating_add(
                    i64::try_from(expires_in_secs)
                        .unwrap_or(i64::MAX)
                        .saturating_mul(1000),
                ),
        };

        self.persist(Some(&session)).await?;
        *lock = Some(session.clone());
        Ok(session)
    }

    /// Removes access token, refresh token and expiry together.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut lock = self.session.lock().await;
        *lock = None;
        self.persist(None).await
    }

    async fn persist(&self, session: Option<&AuthSession>) -> Result<(), StoreError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        match session {
            Some(session) => {
                if let Some(parent) = self.path.parent() {
                    async_fs::create_dir_all(parent).await?;
                }
                let json = serde_json::to_string_pretty(session)?;
                async_fs::write(&self.path, json).await?;
                Ok(())
            }
            None => match async_fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(StoreError::Io(e)),
                _ => Ok(()),
            },
        }
    }
}
