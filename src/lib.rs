//! Streamwatch — library crate.
//!
//! Holds the module tree and shared state, re-exported for the binary and
//! the integration tests in `tests/`.

pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod jobs;
pub mod monitor;
pub mod notification;
pub mod platform;
pub mod store;

use std::sync::Arc;

use credentials::{CredentialStore, OAuthConfig};
use monitor::MonitorRegistry;
use notification::AlertWebhook;
use platform::PlatformClient;
use store::StateStore;

/// Shared application state passed to handlers and jobs.
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub credentials: Arc<CredentialStore>,
    pub platform: Arc<PlatformClient>,
    pub monitors: MonitorRegistry,
    pub config: config::Config,
}

impl AppState {
    /// Wire the component graph on top of a store backend.
    pub fn new(config: config::Config, store: Arc<dyn StateStore>) -> Self {
        let credentials = Arc::new(CredentialStore::new(
            OAuthConfig::from_config(&config),
            store.clone(),
        ));
        let platform = Arc::new(PlatformClient::new(&config, credentials.clone()));
        let webhook = AlertWebhook::new(
            config.alert_webhook_url.clone(),
            config.alert_mention.clone(),
        );
        let monitors = MonitorRegistry::new(&config, store.clone(), platform.clone(), webhook);
        Self {
            store,
            credentials,
            platform,
            monitors,
            config,
        }
    }
}
