use std::time::Duration;

use tracing::{info, warn};

use crate::errors::AppError;

/// Accent color of the alert embed (decimal RGB).
const EMBED_COLOR: u32 = 15_277_667;

// ── Alert Payload ─────────────────────────────────────────────

/// One go-live alert, ready to post.
#[derive(Debug, Clone)]
pub struct StreamAlert {
    pub display_name: String,
    pub channel_url: String,
    /// Raw template URL; the size placeholder is stripped at send time.
    pub thumbnail_url: String,
}

impl StreamAlert {
    /// Build the Discord-compatible body: a content line plus one rich embed.
    fn payload(&self, mention: Option<&str>) -> serde_json::Value {
        let content = match mention {
            Some(m) => format!("{} is live! cc {}", self.display_name, m),
            None => format!("{} is live!", self.display_name),
        };
        serde_json::json!({
            "content": content,
            "embeds": [{
                "title": format!("Watch {} now!", self.display_name),
                "url": self.channel_url,
                "image": { "url": full_size_thumbnail(&self.thumbnail_url) },
                "color": EMBED_COLOR,
            }],
        })
    }
}

/// Strip the `-{width}x{height}` placeholder so the CDN serves the
/// full-size source image.
pub fn full_size_thumbnail(template: &str) -> String {
    template.replace("-{width}x{height}", "")
}

// ── Webhook Sink ──────────────────────────────────────────────

/// Posts go-live alerts to a single webhook URL.
///
/// Delivery policy: one attempt plus exactly one immediate retry. No
/// backoff, no further retries; the caller logs and drops the error.
#[derive(Clone)]
pub struct AlertWebhook {
    client: reqwest::Client,
    url: String,
    mention: Option<String>,
}

impl AlertWebhook {
    pub fn new(url: String, mention: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("streamwatch/0.1")
                .build()
                .expect("failed to build webhook HTTP client"),
            url,
            mention,
        }
    }

    /// Send one alert. Success is any 2xx response.
    pub async fn send(&self, alert: &StreamAlert) -> Result<(), AppError> {
        let payload = alert.payload(self.mention.as_deref());
        let mut last_error = String::new();

        for attempt in 0..2 {
            if attempt > 0 {
                warn!(
                    attempt,
                    error = %last_error,
                    "alert delivery failed, retrying once"
                );
            }

            // wait=true makes the hook endpoint report the delivery result
            // in the status code instead of answering 204 unconditionally.
            let result = self
                .client
                .post(&self.url)
                .query(&[("wait", "true")])
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        channel = %alert.channel_url,
                        status = %resp.status(),
                        attempt,
                        "go-live alert delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    last_error = format!("status={status}, body={body}");
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::NotificationDelivery(last_error))
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> StreamAlert {
        StreamAlert {
            display_name: "Alice".into(),
            channel_url: "https://twitch.tv/alice".into(),
            thumbnail_url: "https://cdn.example/live_user_alice-{width}x{height}.jpg".into(),
        }
    }

    #[test]
    fn payload_contains_embed_fields() {
        let payload = alert().payload(None);
        assert_eq!(payload["content"], "Alice is live!");
        assert_eq!(payload["embeds"][0]["title"], "Watch Alice now!");
        assert_eq!(payload["embeds"][0]["url"], "https://twitch.tv/alice");
        assert_eq!(
            payload["embeds"][0]["image"]["url"],
            "https://cdn.example/live_user_alice.jpg"
        );
        assert_eq!(payload["embeds"][0]["color"], 15_277_667);
    }

    #[test]
    fn payload_appends_mention() {
        let payload = alert().payload(Some("<@85379843826413568>"));
        assert_eq!(payload["content"], "Alice is live! cc <@85379843826413568>");
    }

    #[test]
    fn thumbnail_placeholder_is_stripped() {
        assert_eq!(
            full_size_thumbnail("https://cdn.example/a-{width}x{height}.jpg"),
            "https://cdn.example/a.jpg"
        );
        // URLs without the placeholder pass through untouched
        assert_eq!(
            full_size_thumbnail("https://cdn.example/a.jpg"),
            "https://cdn.example/a.jpg"
        );
    }

    #[tokio::test]
    async fn send_retries_once_on_500_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(query_param("wait", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let hook = AlertWebhook::new(format!("{}/hook", server.uri()), None);
        hook.send(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn send_gives_up_after_second_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let hook = AlertWebhook::new(format!("{}/hook", server.uri()), None);
        let err = hook.send(&alert()).await.unwrap_err();
        assert!(matches!(err, AppError::NotificationDelivery(_)));
    }
}
