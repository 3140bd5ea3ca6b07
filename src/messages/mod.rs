//! Guestbook messages
//!
//! Records live in the key-value store under `message:{id}` as JSON.
//! There is no index: listing scans the prefix and sorts in memory.

mod model;

pub use model::{truncate_chars, Message, NewMessage, MAX_FILES, MAX_NAME_CHARS};

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::logger;
use crate::store::{KvEntry, KvStore, StoreError};

pub const MESSAGE_PREFIX: &str = "message:";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MessageService {
    store: Arc<dyn KvStore>,
    list_limit: usize,
}

impl MessageService {
    pub fn new(store: Arc<dyn KvStore>, list_limit: usize) -> Self {
        Self { store, list_limit }
    }

    /// Validate and persist a new message
    pub async fn create(&self, input: NewMessage) -> Result<Message, MessageError> {
        let name = input.name.as_deref().unwrap_or_default();
        let content = input.content.as_deref().unwrap_or_default();
        if name.trim().is_empty() || content.trim().is_empty() {
            return Err(MessageError::Validation(
                "name and content must not be empty".to_string(),
            ));
        }
        if input.files.len() > MAX_FILES {
            return Err(MessageError::Validation(format!(
                "at most {MAX_FILES} files per message"
            )));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            name: truncate_chars(name, MAX_NAME_CHARS).to_string(),
            content: content.to_string(),
            files: input.files,
            created_at: Utc::now(),
            is_public: input.is_public.unwrap_or(true),
        };

        self.put(&message).await?;
        logger::log_debug(&format!("[Messages] Stored {}", message.id));
        Ok(message)
    }

    /// All messages, newest first
    pub async fn list(&self) -> Result<Vec<Message>, StoreError> {
        let keys = self.store.list(MESSAGE_PREFIX, self.list_limit).await?;
        let mut messages = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(entry) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<Message>(&entry.value) {
                Ok(m) => messages.push(m),
                Err(e) => logger::log_warning(&format!("Skipping unreadable record {key}: {e}")),
            }
        }

        messages.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(messages)
    }

    async fn put(&self, message: &Message) -> Result<(), StoreError> {
        let key = format!("{MESSAGE_PREFIX}{}", message.id);
        let value = serde_json::to_vec(message)?;
        self.store.put(&key, KvEntry::new(value)).await
    }
}
