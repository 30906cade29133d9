use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::errors::AppError;
use crate::platform::models::{StreamEntry, StreamsResponse, UserEntry, UsersResponse};

/// Stateless client for the platform's read endpoints.
///
/// Tokens come from the shared [`CredentialStore`] on every call; the client
/// itself holds no token state, so a refresh performed anywhere in the
/// process is picked up immediately.
pub struct PlatformClient {
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    client_id: String,
    api_base: String,
}

impl PlatformClient {
    pub fn new(cfg: &Config, credentials: Arc<CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(5))
                .user_agent("streamwatch/0.1")
                .build()
                .expect("failed to build platform HTTP client"),
            credentials,
            client_id: cfg.twitch_client_id.clone(),
            api_base: cfg.twitch_api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Look up a user by login.
    ///
    /// A 404 or an empty result set maps to [`AppError::NotFound`]; any other
    /// non-2xx maps to [`AppError::Upstream`] with status and body.
    pub async fn get_user(&self, login: &str) -> Result<UserEntry, AppError> {
        let resp = self.api_get("users", &[("login", login)]).await?;
        let resp = check_status(resp, || format!("user not found: {login}")).await?;
        let body: UsersResponse = resp.json().await?;
        body.data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("user not found: {login}")))
    }

    /// Fetch the creator's current live broadcast, if any.
    ///
    /// Returns `None` when the result set is empty or contains no entry
    /// marked live (reruns are not live sessions).
    pub async fn get_live_stream(&self, login: &str) -> Result<Option<StreamEntry>, AppError> {
        let resp = self.api_get("streams", &[("user_login", login)]).await?;
        let resp = check_status(resp, || format!("channel not found: {login}")).await?;
        let body: StreamsResponse = resp.json().await?;
        Ok(body.data.into_iter().find(|s| s.is_live()))
    }

    /// Authenticated GET with the single forced-refresh retry.
    ///
    /// A 401 can mean the token was revoked upstream even though its expiry
    /// is still in the future; force one refresh and retry exactly once. A
    /// second 401 surfaces as [`AppError::Auth`], never a retry loop.
    async fn api_get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/{}", self.api_base, path);

        let resp = self.send_authed(&url, query).await?;
        if resp.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(path, "platform returned 401, forcing token refresh");
        self.credentials.force_refresh().await?;

        let retry = self.send_authed(&url, query).await?;
        if retry.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth(format!(
                "platform rejected a freshly refreshed token for {path}"
            )));
        }
        Ok(retry)
    }

    async fn send_authed(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, AppError> {
        let token = self.credentials.get_token().await?;
        let resp = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&token.access_token)
            .header("Client-Id", &self.client_id)
            .send()
            .await?;
        Ok(resp)
    }
}

/// Map a non-2xx response to the right error kind, consuming the body.
async fn check_status(
    resp: reqwest::Response,
    not_found_msg: impl FnOnce() -> String,
) -> Result<reqwest::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(not_found_msg()));
    }
    Err(AppError::Upstream {
        status: status.as_u16(),
        body: resp.text().await.unwrap_or_default(),
    })
}
