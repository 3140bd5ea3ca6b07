// GitHub contents API backend
//
// Files are committed to a repository with
// `PUT /repos/{owner}/{repo}/contents/{path}`, content base64-encoded.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;

use super::{object_path, send_checked, StoredUpload, UploadBackend, UploadError, UploadedFile};
use crate::config::GithubConfig;

const BACKEND: &str = "github";

pub struct GithubBackend {
    config: GithubConfig,
    client: reqwest::Client,
    max_size: u64,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

impl GithubBackend {
    pub const fn new(config: GithubConfig, client: reqwest::Client, max_size: u64) -> Self {
        Self {
            config,
            client,
            max_size,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{path}",
            self.config.api_base.trim_end_matches('/'),
            self.config.repo
        )
    }

    fn public_url(&self, path: &str) -> String {
        match &self.config.public_base_url {
            Some(base) => format!("{}/{path}", base.trim_end_matches('/')),
            None => format!(
                "https://raw.githubusercontent.com/{}/{}/{path}",
                self.config.repo, self.config.branch
            ),
        }
    }
}

#[async_trait]
impl UploadBackend for GithubBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn max_size(&self) -> u64 {
        self.max_size
    }

    async fn put(&self, file: &UploadedFile) -> Result<StoredUpload, UploadError> {
        let path = object_path(&self.config.path_prefix, file);
        let body = PutContents {
            message: format!("Add attachment {path}"),
            content: BASE64.encode(&file.data),
            branch: &self.config.branch,
        };

        let request = self
            .client
            .put(self.contents_url(&path))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("guestbook/", env!("CARGO_PKG_VERSION")))
            .json(&body);
        send_checked(BACKEND, request).await?;

        Ok(StoredUpload {
            url: self.public_url(&path),
            key: path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use crate::upload::upload;
    use hyper::body::Bytes;
    use hyper::Method;

    fn config(api_base: &str) -> GithubConfig {
        GithubConfig {
            token: "ghp_token".to_string(),
            repo: "owner/repo".to_string(),
            branch: "assets".to_string(),
            path_prefix: "uploads".to_string(),
            public_base_url: None,
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn test_public_url() {
        let mut cfg = config("https://api.github.com");
        let backend = GithubBackend::new(cfg.clone(), reqwest::Client::new(), 10);
        assert_eq!(
            backend.public_url("uploads/a.png"),
            "https://raw.githubusercontent.com/owner/repo/assets/uploads/a.png"
        );

        cfg.public_base_url = Some("https://guestbook.example/".to_string());
        let backend = GithubBackend::new(cfg, reqwest::Client::new(), 10);
        assert_eq!(
            backend.public_url("uploads/a.png"),
            "https://guestbook.example/uploads/a.png"
        );
    }

    #[tokio::test]
    async fn test_put_commits_base64_content() {
        let (base, mut requests) = spawn_stub(|_| (201, r#"{"content":{}}"#.to_string())).await;
        let backend = GithubBackend::new(config(&base), reqwest::Client::new(), 1024);

        let file = UploadedFile::new("hi.txt", Some("text/plain"), Bytes::from_static(b"hello"));
        let stored = upload(&backend, &file).await.unwrap();
        assert!(stored.key.starts_with("uploads/"));
        assert!(stored.key.ends_with(".txt"));
        assert!(stored.url.ends_with(&stored.key));

        let req = requests.recv().await.unwrap();
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.path, format!("/repos/owner/repo/contents/{}", stored.key));
        assert_eq!(req.headers["authorization"], "Bearer ghp_token");

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["content"], "aGVsbG8=");
        assert_eq!(body["branch"], "assets");
    }

    #[tokio::test]
    async fn test_rejection_is_upstream_error() {
        let (base, _requests) =
            spawn_stub(|_| (422, r#"{"message":"Invalid request"}"#.to_string())).await;
        let backend = GithubBackend::new(config(&base), reqwest::Client::new(), 1024);

        let file = UploadedFile::new("hi.txt", None, Bytes::from_static(b"hello"));
        let err = upload(&backend, &file).await.unwrap_err();
        match err {
            UploadError::Upstream {
                backend, status, ..
            } => {
                assert_eq!(backend, "github");
                assert_eq!(status, 422);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
