//! Session tokens issued by the login endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagdrive_core::secrets::{generate_token, AUTH_TOKEN_LEN};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::persist::{JsonSnapshot, PersistError};

/// Interval between expiry sweeps.
pub const AUTH_SWEEP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub expire: DateTime<Utc>,
}

pub struct AuthTokens {
    snapshot: JsonSnapshot,
    max_token_life: Duration,
    tokens: RwLock<Vec<AuthToken>>,
}

impl AuthTokens {
    pub async fn open(snapshot: JsonSnapshot, max_token_life: Duration) -> Result<Self, PersistError> {
        let tokens: Vec<AuthToken> = snapshot.load_or_create(Vec::new()).await?;
        tracing::debug!(tokens = tokens.len(), "Auth tokens loaded");

        Ok(Self {
            snapshot,
            max_token_life,
            tokens: RwLock::new(tokens),
        })
    }

    pub fn max_token_life(&self) -> Duration {
        self.max_token_life
    }

    async fn write(&self, tokens: &[AuthToken]) {
        if let Err(e) = self.snapshot.write(tokens).await {
            tracing::error!(error = %e, "Failed to write auth tokens");
        }
    }

    /// Fresh random token. It isn't stored until [`AuthTokens::add_token`].
    pub fn generate_token(&self) -> String {
        generate_token(AUTH_TOKEN_LEN)
    }

    pub async fn add_token(&self, token: &str) {
        let life = chrono::Duration::from_std(self.max_token_life)
            .unwrap_or_else(|_| chrono::Duration::days(60));
        let mut tokens = self.tokens.write().await;
        tokens.push(AuthToken {
            token: token.to_string(),
            expire: Utc::now() + life,
        });
        self.write(&tokens).await;
    }

    /// Expired tokens that haven't been swept yet are rejected as well.
    pub async fn check_token(&self, token: &str) -> bool {
        let now = Utc::now();
        self.tokens
            .read()
            .await
            .iter()
            .any(|t| t.token == token && t.expire > now)
    }

    pub async fn delete_token(&self, token: &str) {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| t.token != token);
        if tokens.len() != before {
            self.write(&tokens).await;
        }
    }

    /// Drops tokens that expired before `now`. Returns how many were removed.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|t| t.expire > now);
        let removed = before - tokens.len();
        if removed > 0 {
            self.write(&tokens).await;
        }
        removed
    }

    /// Sweeps once immediately and then every [`AUTH_SWEEP_INTERVAL`] until shutdown.
    pub fn start_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(AUTH_SWEEP_INTERVAL);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.remove_expired(Utc::now()).await;
                        if removed > 0 {
                            tracing::info!(removed, "Expired auth tokens removed");
                        }
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub async fn shutdown(&self) -> Result<(), PersistError> {
        let tokens = self.tokens.read().await;
        self.snapshot.write(&*tokens).await
    }
}
