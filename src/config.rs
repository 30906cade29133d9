use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// OAuth client id for the streaming platform.
    pub twitch_client_id: String,
    /// OAuth client secret for the streaming platform.
    pub twitch_client_secret: String,
    /// Token exchange endpoint (client-credentials grant).
    pub twitch_token_url: String,
    /// Base URL for the Helix REST API.
    pub twitch_api_base: String,
    /// Base URL used to build channel links in alerts and snapshots.
    pub channel_url_base: String,
    /// Discord-compatible webhook that receives go-live alerts.
    pub alert_webhook_url: String,
    /// Optional mention string appended to the alert content (e.g. "<@1234>").
    pub alert_mention: Option<String>,
    /// Creators this deployment is allowed to monitor.
    /// Set via STREAMWATCH_CREATORS as a comma-separated list of logins.
    pub creators: Vec<String>,
    /// Window in which a repeated go-live report is treated as a
    /// continuation of the previous session rather than a fresh trigger.
    /// Set via STREAMWATCH_RENOTIFY_COOLDOWN_HOURS. Default: 8.
    pub renotify_cooldown_hours: i64,
    /// Safety margin subtracted from the platform's stated token expiry.
    /// Set via STREAMWATCH_TOKEN_EXPIRY_MARGIN_SECS. Default: 3600.
    pub token_expiry_margin_secs: i64,
}

impl Config {
    pub fn creator_allowed(&self, creator: &str) -> bool {
        self.creators.iter().any(|c| c == creator)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let client_id = std::env::var("TWITCH_CLIENT_ID").unwrap_or_default();
    let client_secret = std::env::var("TWITCH_CLIENT_SECRET").unwrap_or_default();

    if client_id.is_empty() || client_secret.is_empty() {
        let env_mode = std::env::var("STREAMWATCH_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET are not set. \
                 Provide platform credentials before running in production."
            );
        }
        eprintln!("⚠️  TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET are not set — platform calls will fail.");
    }

    Ok(Config {
        port: std::env::var("STREAMWATCH_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/streamwatch".into()),
        twitch_client_id: client_id,
        twitch_client_secret: client_secret,
        twitch_token_url: std::env::var("TWITCH_TOKEN_URL")
            .unwrap_or_else(|_| "https://id.twitch.tv/oauth2/token".into()),
        twitch_api_base: std::env::var("TWITCH_API_BASE")
            .unwrap_or_else(|_| "https://api.twitch.tv/helix".into()),
        channel_url_base: std::env::var("STREAMWATCH_CHANNEL_URL_BASE")
            .unwrap_or_else(|_| "https://twitch.tv".into()),
        alert_webhook_url: std::env::var("STREAMWATCH_ALERT_WEBHOOK_URL").unwrap_or_default(),
        alert_mention: std::env::var("STREAMWATCH_ALERT_MENTION").ok(),
        creators: std::env::var("STREAMWATCH_CREATORS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        renotify_cooldown_hours: std::env::var("STREAMWATCH_RENOTIFY_COOLDOWN_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8),
        token_expiry_margin_secs: std::env::var("STREAMWATCH_TOKEN_EXPIRY_MARGIN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600),
    })
}
