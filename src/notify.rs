//! Webhook notifier
//!
//! Posts a Discord-style embed for every new message. Delivery is
//! fire-and-forget: it runs in its own task and failures are only logged.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::config::NotifyConfig;
use crate::http::mime;
use crate::logger;
use crate::messages::Message;

/// Embed colours: blue for public, orange for private messages
const COLOR_PUBLIC: u32 = 5_814_783;
const COLOR_PRIVATE: u32 = 15_844_367;

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: String,
    username: String,
}

impl Notifier {
    /// `None` when no webhook is configured
    pub fn from_config(config: &NotifyConfig, client: &reqwest::Client) -> Option<Self> {
        let url = config.webhook_url.as_deref().map(str::trim)?;
        if url.is_empty() {
            return None;
        }
        Some(Self {
            client: client.clone(),
            webhook_url: url.to_string(),
            username: config.username.clone(),
        })
    }

    /// Send the notification in the background
    pub fn notify(&self, message: &Message) {
        let payload = build_payload(message, &self.username);
        let this = self.clone();
        let id = message.id.clone();
        tokio::spawn(async move {
            match this.client.post(&this.webhook_url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    logger::log_debug(&format!("[Notify] Delivered message {id}"));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    logger::log_warning(&format!(
                        "Webhook rejected message {id}: {status} {body}"
                    ));
                }
                Err(e) => {
                    logger::log_warning(&format!("Webhook delivery failed for {id}: {e}"));
                }
            }
        });
    }
}

/// Build the webhook body for a message
pub fn build_payload(message: &Message, username: &str) -> Value {
    let visibility = if message.is_public { "public" } else { "private" };
    let mut embed = json!({
        "title": "New guestbook message",
        "description": message.content,
        "color": if message.is_public { COLOR_PUBLIC } else { COLOR_PRIVATE },
        "fields": [
            { "name": "Name", "value": message.name, "inline": true },
            { "name": "Visibility", "value": visibility, "inline": true },
        ],
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    if let Some(image) = message.files.iter().find(|f| looks_like_image(f)) {
        embed["image"] = json!({ "url": image });
    }

    json!({
        "username": username,
        "content": format!("New message ({visibility})"),
        "embeds": [embed],
    })
}

fn looks_like_image(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path.rsplit_once('.').map(|(_, e)| e);
    mime::is_image(mime::get_content_type(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(files: Vec<String>, is_public: bool) -> Message {
        Message {
            id: "1".to_string(),
            name: "Alice".to_string(),
            content: "hello".to_string(),
            files,
            created_at: Utc::now(),
            is_public,
        }
    }

    #[test]
    fn test_payload_public() {
        let payload = build_payload(&message(vec![], true), "Guestbook");
        assert_eq!(payload["username"], "Guestbook");
        assert_eq!(payload["content"], "New message (public)");
        let embed = &payload["embeds"][0];
        assert_eq!(embed["description"], "hello");
        assert_eq!(embed["color"], COLOR_PUBLIC);
        assert_eq!(embed["fields"][0]["value"], "Alice");
        assert!(embed.get("image").is_none());
    }

    #[test]
    fn test_payload_private_with_image() {
        let files = vec![
            "https://cdn.example/doc.pdf".to_string(),
            "https://cdn.example/cat.PNG?v=1".to_string(),
        ];
        let payload = build_payload(&message(files, false), "Bot");
        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], COLOR_PRIVATE);
        assert_eq!(embed["fields"][1]["value"], "private");
        assert_eq!(embed["image"]["url"], "https://cdn.example/cat.PNG?v=1");
    }

    #[test]
    fn test_disabled_without_url() {
        let client = reqwest::Client::new();
        let mut config = NotifyConfig::default();
        assert!(Notifier::from_config(&config, &client).is_none());

        config.webhook_url = Some("  ".to_string());
        assert!(Notifier::from_config(&config, &client).is_none());

        config.webhook_url = Some("https://discord.example/hook".to_string());
        assert!(Notifier::from_config(&config, &client).is_some());
    }

    #[tokio::test]
    async fn test_notify_posts_payload() {
        let (url, mut requests) = crate::test_support::spawn_stub(|_| (204, String::new())).await;
        let config = NotifyConfig {
            webhook_url: Some(format!("{url}/hook")),
            username: "Guestbook".to_string(),
        };
        let notifier = Notifier::from_config(&config, &reqwest::Client::new()).unwrap();
        notifier.notify(&message(vec![], true));

        let req = requests.recv().await.unwrap();
        assert_eq!(req.path, "/hook");
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["embeds"][0]["fields"][0]["value"], "Alice");
    }
}
