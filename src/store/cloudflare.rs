// Cloudflare Workers KV store over the REST API

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{validate_key, KvEntry, KvStore, StoreError};
use crate::config::CloudflareKvConfig;

/// Workers KV accepts list limits in this range
const LIST_LIMIT_MIN: usize = 10;
const LIST_LIMIT_MAX: usize = 1000;

pub struct CloudflareKvStore {
    config: CloudflareKvConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct KeyInfo {
    name: String,
}

impl CloudflareKvStore {
    pub const fn new(config: CloudflareKvConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// `{api_base}/accounts/{account}/storage/kv/namespaces/{namespace}/{tail...}`
    fn namespace_url(&self, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| StoreError::Config(format!("invalid api_base: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StoreError::Config("api_base cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.extend([
                "accounts",
                self.config.account_id.as_str(),
                "storage",
                "kv",
                "namespaces",
                self.config.namespace_id.as_str(),
            ]);
            segments.extend(tail);
        }
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.config.api_token)
    }

    async fn fetch_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let url = self.namespace_url(&["metadata", key])?;
        let resp = self.authorized(self.client.get(url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: Envelope<serde_json::Value> = check(resp).await?.json().await?;
        Ok(envelope.result.filter(|v| !v.is_null()))
    }
}

#[async_trait]
impl KvStore for CloudflareKvStore {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn get(&self, key: &str) -> Result<Option<KvEntry>, StoreError> {
        validate_key(key)?;
        let url = self.namespace_url(&["values", key])?;
        let resp = self.authorized(self.client.get(url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = check(resp).await?.bytes().await?;
        let metadata = self.fetch_metadata(key).await?;
        Ok(Some(KvEntry { value, metadata }))
    }

    async fn put(&self, key: &str, entry: KvEntry) -> Result<(), StoreError> {
        validate_key(key)?;
        let url = self.namespace_url(&["values", key])?;
        let metadata = entry
            .metadata
            .as_ref()
            .map_or_else(|| Ok("{}".to_string()), serde_json::to_string)?;
        let form = Form::new()
            .part("value", Part::bytes(entry.value.to_vec()))
            .text("metadata", metadata);

        let resp = self
            .authorized(self.client.put(url))
            .multipart(form)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut url = self.namespace_url(&["keys"])?;
        url.query_pairs_mut()
            .append_pair("prefix", prefix)
            .append_pair(
                "limit",
                &limit.clamp(LIST_LIMIT_MIN, LIST_LIMIT_MAX).to_string(),
            );

        let resp = self.authorized(self.client.get(url)).send().await?;
        let envelope: Envelope<Vec<KeyInfo>> = check(resp).await?.json().await?;
        if !envelope.success {
            return Err(StoreError::Backend {
                status: 200,
                body: serde_json::to_string(&envelope.errors)?,
            });
        }

        let mut keys: Vec<String> = envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|k| k.name)
            .collect();
        keys.truncate(limit);
        Ok(keys)
    }
}

/// Turn a non-2xx response into `StoreError::Backend`
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Backend {
        status: status.as_u16(),
        body,
    })
}
