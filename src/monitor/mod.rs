pub mod record;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::errors::AppError;
use crate::notification::{AlertWebhook, StreamAlert};
use crate::platform::PlatformClient;
use crate::store::{monitor_key, StateStore};

pub use record::{CreatorProfile, MonitorRecord, StreamStatus};

/// Per-creator monitor.
///
/// All operations on one creator are serialized behind the instance mutex,
/// so a profile fetch and a poll tick never interleave; different creators
/// run fully independently.
pub struct Monitor {
    creator: String,
    store: Arc<dyn StateStore>,
    platform: Arc<PlatformClient>,
    webhook: AlertWebhook,
    channel_url_base: String,
    renotify_cooldown: Duration,
    lock: Mutex<()>,
}

impl Monitor {
    /// Lazily populate the creator profile, binding the creator identity
    /// into the durable record on first contact.
    ///
    /// Idempotent: a populated `display_name` short-circuits, even when the
    /// image fields were only partially filled by an earlier version.
    pub async fn ensure_profile(&self) -> Result<MonitorRecord, AppError> {
        let _guard = self.lock.lock().await;

        let mut record = self.load_or_default().await?;
        let mut dirty = false;

        if record.creator_id != self.creator {
            record.creator_id = self.creator.clone();
            dirty = true;
        }

        if record.profile.display_name.is_empty() {
            let user = match self.platform.get_user(&self.creator).await {
                Ok(user) => user,
                Err(AppError::NotFound(msg)) => {
                    // The creator does not exist upstream; drop whatever
                    // state accumulated under this identity.
                    info!(creator = %self.creator, "creator not found upstream, purging state");
                    self.store.purge(&monitor_key(&self.creator)).await?;
                    return Err(AppError::NotFound(msg));
                }
                Err(e) => return Err(e),
            };
            record.profile = CreatorProfile {
                display_name: user.display_name,
                profile_image_url: user.profile_image_url,
                offline_image_url: user.offline_image_url,
            };
            dirty = true;
        }

        if dirty {
            self.save(&record).await?;
        }
        Ok(record)
    }

    /// Read-only snapshot of the durable record, if one exists.
    pub async fn get_state(&self) -> Result<Option<MonitorRecord>, AppError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// One scheduled tick: fetch live status, update state, and alert at
    /// most once per live session.
    ///
    /// Every error is contained here, logged with creator context and
    /// swallowed, never re-raised to the scheduler. State persisted before
    /// a failure stays committed.
    pub async fn poll_and_notify(&self, expected_creator: &str) {
        let _guard = self.lock.lock().await;
        if let Err(e) = self.run_poll(expected_creator).await {
            error!(creator = %self.creator, error = %e, "live-status poll failed");
        }
    }

    async fn run_poll(&self, expected_creator: &str) -> Result<(), AppError> {
        let mut record = self.load_or_default().await?;

        if record.creator_id.is_empty() {
            return Err(AppError::Invariant(format!(
                "poll dispatched for {expected_creator:?} but no creator is bound to this monitor"
            )));
        }
        if record.creator_id != expected_creator {
            return Err(AppError::Invariant(format!(
                "poll dispatched with creator {:?} but this monitor is bound to {:?}",
                expected_creator, record.creator_id
            )));
        }

        let Some(stream) = self.platform.get_live_stream(&record.creator_id).await? else {
            if record.status.is_live() {
                info!(creator = %self.creator, "stream went offline");
            }
            record.status = StreamStatus::Offline;
            self.save(&record).await?;
            return Ok(());
        };

        let now = Utc::now();
        let notified_at = carried_alert_stamp(
            &record.status,
            record.last_notified_at,
            &stream.id,
            now,
            self.renotify_cooldown,
        );

        let same_session = matches!(
            &record.status,
            StreamStatus::Live { stream_id, .. } if *stream_id == stream.id
        );
        if !same_session {
            info!(creator = %self.creator, stream_id = %stream.id, "stream is live");
        }

        record.status = StreamStatus::Live {
            stream_id: stream.id.clone(),
            thumbnail_url: stream.thumbnail_url.clone(),
            notified_at,
        };
        self.save(&record).await?;

        if notified_at.is_some() {
            debug!(creator = %self.creator, stream_id = %stream.id, "alert already covered for this session");
            return Ok(());
        }

        let display_name = if record.profile.display_name.is_empty() {
            record.creator_id.clone()
        } else {
            record.profile.display_name.clone()
        };
        let alert = StreamAlert {
            display_name,
            channel_url: format!("{}/{}", self.channel_url_base, record.creator_id),
            thumbnail_url: stream.thumbnail_url.clone(),
        };
        self.webhook.send(&alert).await?;

        // Re-load before stamping: another process may have flipped the
        // status to offline while the hook was in flight, and stamping an
        // offline record would be meaningless.
        let mut current = self.load_or_default().await?;
        if let StreamStatus::Live { notified_at, .. } = &mut current.status {
            let stamped = Utc::now();
            *notified_at = Some(stamped);
            current.last_notified_at = Some(stamped);
            self.save(&current).await?;
        } else {
            debug!(creator = %self.creator, "stream no longer live, skipping alert stamp");
        }
        Ok(())
    }

    async fn load(&self) -> Result<Option<MonitorRecord>, AppError> {
        let Some(value) = self.store.load(&monitor_key(&self.creator)).await? else {
            return Ok(None);
        };
        Ok(Some(record::migrate_record(value)?))
    }

    async fn load_or_default(&self) -> Result<MonitorRecord, AppError> {
        // Identity is bound by the page path, not by polling, so a fresh
        // record starts unbound.
        Ok(self.load().await?.unwrap_or_else(|| MonitorRecord::new("")))
    }

    async fn save(&self, record: &MonitorRecord) -> Result<(), AppError> {
        let value = serde_json::to_value(record).map_err(anyhow::Error::from)?;
        self.store.save(&monitor_key(&self.creator), &value).await?;
        Ok(())
    }
}

/// Decide whether a live report continues an already-alerted session.
///
/// The previous stamp is carried forward when the monitor was live with the
/// same stream id, or when the last alert (for any session, including one
/// interrupted by an offline poll) is younger than the cooldown window.
/// Otherwise the report is a genuinely new session and the stamp clears.
fn carried_alert_stamp(
    status: &StreamStatus,
    last_notified_at: Option<DateTime<Utc>>,
    new_stream_id: &str,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<DateTime<Utc>> {
    let cooldown_start = now - cooldown;
    match status {
        StreamStatus::Live {
            stream_id,
            notified_at: Some(prev),
            ..
        } if *stream_id == new_stream_id => {
            debug!(rule = "same_stream_id", "carrying previous alert stamp");
            Some(*prev)
        }
        StreamStatus::Live {
            notified_at: Some(prev),
            ..
        } if *prev > cooldown_start => {
            debug!(rule = "cooldown_window", "carrying previous alert stamp");
            Some(*prev)
        }
        _ => {
            let carried = last_notified_at.filter(|t| *t > cooldown_start);
            if carried.is_some() {
                debug!(rule = "recent_alert", "carrying alert stamp across an offline gap");
            }
            carried
        }
    }
}

/// Hands out one [`Monitor`] per creator, creating it on first use.
#[derive(Clone)]
pub struct MonitorRegistry {
    monitors: Arc<DashMap<String, Arc<Monitor>>>,
    store: Arc<dyn StateStore>,
    platform: Arc<PlatformClient>,
    webhook: AlertWebhook,
    channel_url_base: String,
    renotify_cooldown: Duration,
}

impl MonitorRegistry {
    pub fn new(
        cfg: &Config,
        store: Arc<dyn StateStore>,
        platform: Arc<PlatformClient>,
        webhook: AlertWebhook,
    ) -> Self {
        Self {
            monitors: Arc::new(DashMap::new()),
            store,
            platform,
            webhook,
            channel_url_base: cfg.channel_url_base.trim_end_matches('/').to_string(),
            renotify_cooldown: Duration::hours(cfg.renotify_cooldown_hours),
        }
    }

    pub fn monitor(&self, creator: &str) -> Arc<Monitor> {
        self.monitors
            .entry(creator.to_string())
            .or_insert_with(|| {
                Arc::new(Monitor {
                    creator: creator.to_string(),
                    store: self.store.clone(),
                    platform: self.platform.clone(),
                    webhook: self.webhook.clone(),
                    channel_url_base: self.channel_url_base.clone(),
                    renotify_cooldown: self.renotify_cooldown,
                    lock: Mutex::new(()),
                })
            })
            .clone()
    }

    /// Drop all durable state for a creator (best-effort, used when the
    /// identifier fails allow-list validation).
    pub async fn purge(&self, creator: &str) -> Result<(), AppError> {
        self.monitors.remove(creator);
        self.store.purge(&monitor_key(creator)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(stream_id: &str, notified_at: Option<DateTime<Utc>>) -> StreamStatus {
        StreamStatus::Live {
            stream_id: stream_id.to_string(),
            thumbnail_url: String::new(),
            notified_at,
        }
    }

    #[test]
    fn same_stream_id_keeps_stamp_regardless_of_age() {
        let now = Utc::now();
        let old = now - Duration::hours(30);
        let carried =
            carried_alert_stamp(&live("123", Some(old)), Some(old), "123", now, Duration::hours(8));
        assert_eq!(carried, Some(old));
    }

    #[test]
    fn new_stream_id_within_cooldown_keeps_stamp() {
        let now = Utc::now();
        let recent = now - Duration::hours(1);
        let carried = carried_alert_stamp(
            &live("123", Some(recent)),
            Some(recent),
            "456",
            now,
            Duration::hours(8),
        );
        assert_eq!(carried, Some(recent));
    }

    #[test]
    fn new_stream_id_after_cooldown_clears_stamp() {
        let now = Utc::now();
        let old = now - Duration::hours(9);
        let carried =
            carried_alert_stamp(&live("123", Some(old)), Some(old), "456", now, Duration::hours(8));
        assert_eq!(carried, None);
    }

    #[test]
    fn offline_gap_within_cooldown_keeps_stamp() {
        let now = Utc::now();
        let recent = now - Duration::hours(2);
        let carried = carried_alert_stamp(
            &StreamStatus::Offline,
            Some(recent),
            "456",
            now,
            Duration::hours(8),
        );
        assert_eq!(carried, Some(recent));
    }

    #[test]
    fn offline_gap_after_cooldown_clears_stamp() {
        let now = Utc::now();
        let old = now - Duration::hours(12);
        let carried = carried_alert_stamp(
            &StreamStatus::Offline,
            Some(old),
            "456",
            now,
            Duration::hours(8),
        );
        assert_eq!(carried, None);
    }

    #[test]
    fn unalerted_live_session_has_no_stamp_to_carry() {
        let now = Utc::now();
        let carried =
            carried_alert_stamp(&live("123", None), None, "123", now, Duration::hours(8));
        assert_eq!(carried, None);
    }
}
