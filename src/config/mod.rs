// Configuration module entry point
// Loads layered configuration and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::{AppState, UPSTREAM_TIMEOUT};
pub use types::{
    B2Config, CloudflareKvConfig, Config, GithubConfig, HealthConfig, NotifyConfig,
    StorageBackend, StorageConfig, UploadConfig,
};

/// Default config file name (without extension)
const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the path given as first CLI argument,
    /// or from "config.toml" in the working directory
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables override the file, e.g.
    /// `GUESTBOOK_UPLOAD__GITHUB__TOKEN` sets `upload.github.token`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GUESTBOOK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "guestbook/0.1")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 31_457_280)? // 30MB
            .set_default("storage.backend", "file")?
            .set_default("storage.data_dir", "data")?
            .set_default("storage.list_limit", 100)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("does-not-exist/guestbook").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.list_limit, 100);
        assert_eq!(cfg.storage.backend, StorageBackend::File);
        assert_eq!(cfg.upload.fallback_max_size, 1_048_576);
        assert_eq!(cfg.upload.external_max_size, 26_214_400);
        assert!(cfg.health.enabled);
        assert_eq!(cfg.notify.username, "Guestbook");
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = Config::load_from("does-not-exist/guestbook").unwrap();
        cfg.server.host = "0.0.0.0".to_string();
        cfg.server.port = 9000;
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 9000);

        cfg.server.host = "not an address".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }

    #[test]
    fn test_github_requires_token_and_repo() {
        let mut github = GithubConfig {
            token: String::new(),
            repo: "owner/repo".to_string(),
            branch: "main".to_string(),
            path_prefix: "uploads".to_string(),
            public_base_url: None,
            api_base: "https://api.github.com".to_string(),
        };
        assert!(!github.is_configured());

        github.token = "ghp_secret".to_string();
        assert!(github.is_configured());

        github.repo = "missing-owner".to_string();
        assert!(!github.is_configured());
    }
}
