// Application state module
// Shared services built once at startup and handed to every request

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use super::types::Config;
use crate::messages::MessageService;
use crate::notify::Notifier;
use crate::store::{self, KvStore, StoreError};
use crate::upload::{self, UploadBackend};

/// Timeout for outbound calls to GitHub, B2, Cloudflare and webhooks
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KvStore>,
    pub messages: MessageService,
    pub uploader: Arc<dyn UploadBackend>,
    pub notifier: Option<Notifier>,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,

    /// Connections currently being served
    pub active_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// Open storage and resolve the upload backend from configuration
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .user_agent(config.http.server_name.clone())
            .build()?;
        let store = store::open(&config.storage, &client)?;
        let uploader = upload::select_backend(&config.upload, Arc::clone(&store), &client);
        let notifier = Notifier::from_config(&config.notify, &client);
        Ok(Self::assemble(config, store, uploader, notifier))
    }

    /// Build state around explicit store and uploader
    #[cfg(test)]
    pub fn with_parts(
        config: Config,
        store: Arc<dyn KvStore>,
        uploader: Arc<dyn UploadBackend>,
    ) -> Self {
        Self::assemble(config, store, uploader, None)
    }

    fn assemble(
        config: Config,
        store: Arc<dyn KvStore>,
        uploader: Arc<dyn UploadBackend>,
        notifier: Option<Notifier>,
    ) -> Self {
        let messages = MessageService::new(Arc::clone(&store), config.storage.list_limit);
        let cached_access_log = AtomicBool::new(config.logging.access_log);
        Self {
            config,
            store,
            messages,
            uploader,
            notifier,
            cached_access_log,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }
}
