use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::store::{StateStore, TOKEN_KEY};

pub const TOKEN_SCHEMA_VERSION: u32 = 1;

/// App access token obtained via the client-credentials grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Expiry with the safety margin already subtracted.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Response body of the token exchange endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime of the new token in seconds.
    expires_in: i64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

/// Durable envelope for the shared platform token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    version: u32,
    #[serde(flatten)]
    token: AccessToken,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    /// Subtracted from the platform's stated expiry when computing
    /// `expires_at`, so the token is rotated before it actually lapses.
    pub expiry_margin: chrono::Duration,
}

impl OAuthConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            client_id: cfg.twitch_client_id.clone(),
            client_secret: cfg.twitch_client_secret.clone(),
            token_url: cfg.twitch_token_url.clone(),
            expiry_margin: chrono::Duration::seconds(cfg.token_expiry_margin_secs),
        }
    }
}

/// Process-wide cache for the shared platform token.
///
/// All token reads and writes happen under one async mutex, so N concurrent
/// callers produce at most one outbound refresh: the first caller refreshes,
/// the rest observe the already-refreshed token when the lock is released.
/// Forced refreshes (after a 401) are additionally deduplicated by a
/// reentrancy flag: the initiator performs the call, concurrent arrivals
/// short-circuit instead of queueing a second exchange.
pub struct CredentialStore {
    http: reqwest::Client,
    oauth: OAuthConfig,
    store: Arc<dyn StateStore>,
    token: Mutex<Option<AccessToken>>,
    force_refreshing: AtomicBool,
}

impl CredentialStore {
    pub fn new(oauth: OAuthConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("streamwatch/0.1")
                .build()
                .expect("failed to build token HTTP client"),
            oauth,
            store,
            token: Mutex::new(None),
            force_refreshing: AtomicBool::new(false),
        }
    }

    /// Return the cached token, refreshing it first if missing or expired.
    pub async fn get_token(&self) -> Result<AccessToken, AppError> {
        let mut cached = self.token.lock().await;

        if cached.is_none() {
            *cached = self.load_persisted().await?;
        }
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.clone());
            }
        }

        debug!("platform token missing or expired, refreshing");
        self.refresh_locked(&mut cached).await
    }

    /// Unconditionally fetch a new token, bypassing the expiry check.
    ///
    /// Used when the platform rejects a token that still looks unexpired
    /// (revoked upstream). If a forced refresh is already in flight the call
    /// returns immediately; the initiator's refresh covers it.
    pub async fn force_refresh(&self) -> Result<(), AppError> {
        if self.force_refreshing.swap(true, Ordering::SeqCst) {
            debug!("token force refresh already in flight, skipping");
            return Ok(());
        }

        let result = async {
            let mut cached = self.token.lock().await;
            self.refresh_locked(&mut cached).await.map(|_| ())
        }
        .await;

        self.force_refreshing.store(false, Ordering::SeqCst);
        result
    }

    /// Exchange client credentials for a fresh token. Caller holds the lock.
    /// The previous token is only replaced once the new one is persisted.
    async fn refresh_locked(
        &self,
        cached: &mut Option<AccessToken>,
    ) -> Result<AccessToken, AppError> {
        info!("refreshing platform access token");

        let resp = self
            .http
            .post(&self.oauth.token_url)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status, body });
        }
        let body: TokenResponse = resp.json().await?;

        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::seconds(body.expires_in) - self.oauth.expiry_margin;
        if expires_at <= now {
            // Clock skew or bad credentials; retrying would loop forever.
            return Err(AppError::Configuration(format!(
                "computed token expiry is in the past: expires_in={}s, margin={}s",
                body.expires_in,
                self.oauth.expiry_margin.num_seconds(),
            )));
        }

        let token = AccessToken {
            access_token: body.access_token,
            expires_at,
        };
        let record = serde_json::to_value(TokenRecord {
            version: TOKEN_SCHEMA_VERSION,
            token: token.clone(),
        })
        .map_err(anyhow::Error::from)?;
        self.store.save(TOKEN_KEY, &record).await?;
        *cached = Some(token.clone());

        info!(expires_at = %token.expires_at, "platform access token refreshed");
        Ok(token)
    }

    /// Load the durable token record, if one survives from a previous run.
    /// A record with an unrecognized version is ignored rather than migrated:
    /// the token is re-derivable from the platform, so the next refresh
    /// replaces it.
    async fn load_persisted(&self) -> Result<Option<AccessToken>, AppError> {
        let Some(value) = self.store.load(TOKEN_KEY).await? else {
            return Ok(None);
        };
        let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
        if version != u64::from(TOKEN_SCHEMA_VERSION) {
            warn!(version, "ignoring persisted token with unknown schema version");
            return Ok(None);
        }
        match serde_json::from_value::<TokenRecord>(value) {
            Ok(record) => Ok(Some(record.token)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable persisted token record");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn test_store() -> CredentialStore {
        let oauth = OAuthConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            token_url: "http://127.0.0.1:1/oauth2/token".into(),
            expiry_margin: chrono::Duration::hours(1),
        };
        CredentialStore::new(oauth, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn token_expiry_check() {
        let now = Utc::now();
        let live = AccessToken {
            access_token: "abc".into(),
            expires_at: now + chrono::Duration::minutes(5),
        };
        let stale = AccessToken {
            access_token: "abc".into(),
            expires_at: now - chrono::Duration::seconds(1),
        };
        assert!(!live.is_expired(now));
        assert!(stale.is_expired(now));
    }

    #[tokio::test]
    async fn persisted_token_with_unknown_version_is_ignored() {
        let creds = test_store();
        creds
            .store
            .save(
                TOKEN_KEY,
                &json!({
                    "version": 99,
                    "access_token": "old",
                    "expires_at": Utc::now() + chrono::Duration::days(30),
                }),
            )
            .await
            .unwrap();

        assert!(creds.load_persisted().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persisted_token_roundtrip() {
        let creds = test_store();
        let token = AccessToken {
            access_token: "abc".into(),
            expires_at: Utc::now() + chrono::Duration::days(30),
        };
        let record = serde_json::to_value(TokenRecord {
            version: TOKEN_SCHEMA_VERSION,
            token: token.clone(),
        })
        .unwrap();
        creds.store.save(TOKEN_KEY, &record).await.unwrap();

        assert_eq!(creds.load_persisted().await.unwrap(), Some(token));
    }
}
