//! Response bodies of the Helix read endpoints, trimmed to the fields the
//! monitor consumes.

use serde::Deserialize;

/// GET /streams?user_login=...
#[derive(Debug, Deserialize)]
pub struct StreamsResponse {
    pub data: Vec<StreamEntry>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    pub id: String,
    pub user_login: String,
    pub user_name: String,
    /// "live" for a live broadcast; anything else means not live.
    #[serde(rename = "type")]
    pub stream_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub started_at: String,
    /// Template URL containing a `-{width}x{height}` placeholder.
    pub thumbnail_url: String,
}

impl StreamEntry {
    pub fn is_live(&self) -> bool {
        self.stream_type == "live"
    }
}

/// GET /users?login=...
#[derive(Debug, Deserialize)]
pub struct UsersResponse {
    pub data: Vec<UserEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub profile_image_url: String,
    #[serde(default)]
    pub offline_image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_streams_payload() {
        let json = r#"{
            "data": [{
                "id": "40952121085",
                "user_id": "101051819",
                "user_login": "alice",
                "user_name": "Alice",
                "game_id": "498566",
                "game_name": "Slots",
                "type": "live",
                "title": "late night stream",
                "viewer_count": 122,
                "started_at": "2024-03-08T07:35:00Z",
                "language": "en",
                "thumbnail_url": "https://static-cdn.example/previews-ttv/live_user_alice-{width}x{height}.jpg",
                "tag_ids": [],
                "tags": ["English"],
                "is_mature": false
            }],
            "pagination": {}
        }"#;

        let parsed: StreamsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        let stream = &parsed.data[0];
        assert!(stream.is_live());
        assert_eq!(stream.id, "40952121085");
        assert_eq!(stream.user_login, "alice");
        assert_eq!(stream.viewer_count, 122);
    }

    #[test]
    fn rerun_entries_are_not_live() {
        let json = r#"{"data": [{
            "id": "1",
            "user_login": "alice",
            "user_name": "Alice",
            "type": "rerun",
            "thumbnail_url": "https://example/t-{width}x{height}.jpg"
        }], "pagination": {}}"#;

        let parsed: StreamsResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.data[0].is_live());
    }

    #[test]
    fn parses_users_payload() {
        let json = r#"{"data": [{
            "id": "101051819",
            "login": "alice",
            "display_name": "Alice",
            "type": "",
            "broadcaster_type": "partner",
            "description": "hi",
            "profile_image_url": "https://static-cdn.example/profile.png",
            "offline_image_url": "https://static-cdn.example/offline.png",
            "view_count": 0,
            "created_at": "2015-10-17T00:00:00Z"
        }]}"#;

        let parsed: UsersResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].display_name, "Alice");
        assert_eq!(parsed.data[0].offline_image_url, "https://static-cdn.example/offline.png");
    }
}
