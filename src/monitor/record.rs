//! Durable per-creator state and its schema migrations.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const MONITOR_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub offline_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamStatus {
    Offline,
    Live {
        stream_id: String,
        /// Template URL as reported by the platform (size placeholder intact).
        thumbnail_url: String,
        /// Set once an alert for this `stream_id` was delivered, or carried
        /// forward under the anti-flap rule.
        notified_at: Option<DateTime<Utc>>,
    },
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self::Offline
    }
}

impl StreamStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub version: u32,
    /// Creator login this record is bound to. Empty until the first page
    /// load binds it.
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub profile: CreatorProfile,
    #[serde(default)]
    pub status: StreamStatus,
    /// When the most recent alert went out, regardless of session. Survives
    /// offline transitions; drives the anti-flap cooldown across brief
    /// upstream gaps.
    #[serde(default)]
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl MonitorRecord {
    pub fn new(creator_id: &str) -> Self {
        Self {
            version: MONITOR_SCHEMA_VERSION,
            creator_id: creator_id.to_string(),
            profile: CreatorProfile::default(),
            status: StreamStatus::Offline,
            last_notified_at: None,
        }
    }
}

/// Load a stored monitor record, migrating older schema versions in place.
///
/// Unlike the token record, monitor state is not re-derivable (the alert
/// bookkeeping exists nowhere else), so an unknown version is an error
/// rather than a silent reset.
pub fn migrate_record(value: serde_json::Value) -> anyhow::Result<MonitorRecord> {
    let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(1);
    match version {
        v if v == u64::from(MONITOR_SCHEMA_VERSION) => Ok(serde_json::from_value(value)?),
        1 => migrate_v1(value),
        v => anyhow::bail!("unsupported monitor record schema version {v}"),
    }
}

/// v1 records were flat: profile fields at the top level, the alert stamp
/// as epoch milliseconds inside a struct-shaped status, and no cross-session
/// `last_notified_at`.
fn migrate_v1(value: serde_json::Value) -> anyhow::Result<MonitorRecord> {
    #[derive(Default, Deserialize)]
    struct V1Status {
        #[serde(default)]
        is_live: bool,
        #[serde(default)]
        stream_id: Option<String>,
        #[serde(default)]
        thumbnail_url: Option<String>,
        #[serde(default)]
        notified_at_ms: Option<i64>,
    }

    #[derive(Deserialize)]
    struct V1Record {
        #[serde(default)]
        creator: String,
        #[serde(default)]
        display_name: String,
        #[serde(default)]
        profile_image_url: String,
        #[serde(default)]
        offline_image_url: String,
        #[serde(default)]
        status: Option<V1Status>,
    }

    let old: V1Record = serde_json::from_value(value)?;
    let old_status = old.status.unwrap_or_default();

    let notified_at = old_status
        .notified_at_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    let status = if old_status.is_live {
        StreamStatus::Live {
            stream_id: old_status.stream_id.unwrap_or_default(),
            thumbnail_url: old_status.thumbnail_url.unwrap_or_default(),
            notified_at,
        }
    } else {
        StreamStatus::Offline
    };

    Ok(MonitorRecord {
        version: MONITOR_SCHEMA_VERSION,
        creator_id: old.creator,
        profile: CreatorProfile {
            display_name: old.display_name,
            profile_image_url: old.profile_image_url,
            offline_image_url: old.offline_image_url,
        },
        // Seed the cross-session stamp from the in-flight one.
        last_notified_at: notified_at,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_with_explicit_discriminant() {
        let offline = serde_json::to_value(StreamStatus::Offline).unwrap();
        assert_eq!(offline, json!({"state": "offline"}));

        let live = serde_json::to_value(StreamStatus::Live {
            stream_id: "123".into(),
            thumbnail_url: "https://cdn.example/t.jpg".into(),
            notified_at: None,
        })
        .unwrap();
        assert_eq!(live["state"], "live");
        assert_eq!(live["stream_id"], "123");
        assert_eq!(live["notified_at"], serde_json::Value::Null);
    }

    #[test]
    fn current_version_passes_through() {
        let record = MonitorRecord::new("alice");
        let value = serde_json::to_value(&record).unwrap();
        let loaded = migrate_record(value).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn migrates_v1_live_record() {
        let value = json!({
            "creator": "alice",
            "display_name": "Alice",
            "profile_image_url": "https://cdn.example/p.png",
            "offline_image_url": "https://cdn.example/o.png",
            "status": {
                "is_live": true,
                "stream_id": "40952121085",
                "thumbnail_url": "https://cdn.example/t-{width}x{height}.jpg",
                "notified_at_ms": 1709900000000i64
            }
        });

        let record = migrate_record(value).unwrap();
        assert_eq!(record.version, MONITOR_SCHEMA_VERSION);
        assert_eq!(record.creator_id, "alice");
        assert_eq!(record.profile.display_name, "Alice");

        let StreamStatus::Live {
            stream_id,
            notified_at,
            ..
        } = &record.status
        else {
            panic!("expected live status");
        };
        assert_eq!(stream_id, "40952121085");
        let stamp = notified_at.expect("alert stamp should survive migration");
        assert_eq!(stamp.timestamp_millis(), 1709900000000);
        assert_eq!(record.last_notified_at, Some(stamp));
    }

    #[test]
    fn migrates_v1_offline_record() {
        let value = json!({
            "creator": "alice",
            "display_name": "Alice",
            "status": { "is_live": false }
        });

        let record = migrate_record(value).unwrap();
        assert_eq!(record.status, StreamStatus::Offline);
        assert_eq!(record.last_notified_at, None);
        assert_eq!(record.profile.profile_image_url, "");
    }

    #[test]
    fn unknown_version_is_an_error() {
        let err = migrate_record(json!({"version": 7, "creator_id": "alice"})).unwrap_err();
        assert!(err.to_string().contains("schema version 7"));
    }
}
