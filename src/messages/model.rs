// Guestbook message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum nickname length, counted in characters
pub const MAX_NAME_CHARS: usize = 50;

/// Maximum number of attachment URLs per message
pub const MAX_FILES: usize = 5;

/// A stored guestbook entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(with = "iso8601_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

const fn default_public() -> bool {
    true
}

/// Create-message input, accepting both field spellings seen from clients
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default, alias = "nickname")]
    pub name: Option<String>,
    #[serde(default, alias = "message")]
    pub content: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[cfg(test)]
impl NewMessage {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `createdAt` as ISO-8601 with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("Alice", 50), "Alice");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("访客留言板", 2), "访客");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_message_json_shape() {
        let msg = Message {
            id: "abc".to_string(),
            name: "Alice".to_string(),
            content: "hello".to_string(),
            files: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            is_public: true,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["createdAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["isPublic"], true);
        assert_eq!(value["files"], serde_json::json!([]));

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_new_message_aliases() {
        let input: NewMessage =
            serde_json::from_str(r#"{"nickname":"Bob","message":"hi","isPublic":false}"#).unwrap();
        assert_eq!(input.name.as_deref(), Some("Bob"));
        assert_eq!(input.content.as_deref(), Some("hi"));
        assert_eq!(input.is_public, Some(false));
        assert!(input.files.is_empty());
    }

    #[test]
    fn test_legacy_record_defaults_public() {
        let msg: Message = serde_json::from_str(
            r#"{"id":"1","name":"a","content":"b","createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(msg.is_public);
        assert!(msg.files.is_empty());
    }
}
