// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level written: debug, info, warn or error
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,
}

const fn default_shutdown_grace() -> u64 {
    10
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Upper bound for any request body, multipart overhead included
    pub max_body_size: u64,
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness check path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness check path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Key-value store backend kind
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    File,
    Cloudflare,
}

/// Key-value storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory used by the `file` backend
    pub data_dir: String,
    /// Maximum number of messages returned by a listing
    pub list_limit: usize,
    #[serde(default)]
    pub cloudflare: Option<CloudflareKvConfig>,
}

/// Cloudflare Workers KV namespace reached through the REST API
#[derive(Debug, Deserialize, Clone)]
pub struct CloudflareKvConfig {
    pub account_id: String,
    pub namespace_id: String,
    pub api_token: String,
    #[serde(default = "default_cloudflare_api_base")]
    pub api_base: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_cloudflare_api_base() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

/// Attachment upload configuration
///
/// The backend is chosen from whichever credentials are present:
/// GitHub first, then B2, otherwise the key-value store itself.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub b2: Option<B2Config>,
    /// Size bound when an external object host is active
    #[serde(default = "default_external_max_size")]
    pub external_max_size: u64,
    /// Size bound when files are kept in the key-value store
    #[serde(default = "default_fallback_max_size")]
    pub fallback_max_size: u64,
}

const fn default_external_max_size() -> u64 {
    25 * 1024 * 1024
}

const fn default_fallback_max_size() -> u64 {
    1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            github: None,
            b2: None,
            external_max_size: default_external_max_size(),
            fallback_max_size: default_fallback_max_size(),
        }
    }
}

/// GitHub contents API credentials
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: String,
    /// Repository as `owner/name`
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_github_branch")]
    pub branch: String,
    #[serde(default = "default_upload_prefix")]
    pub path_prefix: String,
    /// Public base URL serving the repository contents; raw.githubusercontent.com when unset
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

impl GithubConfig {
    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty() && self.repo.contains('/')
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_github_branch() -> String {
    "main".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_upload_prefix() -> String {
    "uploads".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Backblaze B2 credentials
#[derive(Debug, Deserialize, Clone)]
pub struct B2Config {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub application_key: String,
    #[serde(default)]
    pub bucket_id: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default = "default_upload_prefix")]
    pub path_prefix: String,
    /// Download host override; the one returned by authorization when unset
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default = "default_b2_api_base")]
    pub api_base: String,
}

impl B2Config {
    pub fn is_configured(&self) -> bool {
        !self.key_id.trim().is_empty()
            && !self.application_key.trim().is_empty()
            && !self.bucket_id.trim().is_empty()
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_b2_api_base() -> String {
    "https://api.backblazeb2.com".to_string()
}

/// Webhook notification configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_username")]
    pub username: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_notify_username() -> String {
    "Guestbook".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: default_notify_username(),
        }
    }
}
