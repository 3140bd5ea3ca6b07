// Backblaze B2 backend (native API v2)
//
// authorize_account -> get_upload_url -> upload_file. An authorization is
// fetched per upload; nothing is cached between requests.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use super::{
    object_path, send_checked, StoredUpload, UploadBackend, UploadCredentials, UploadError,
    UploadedFile,
};
use crate::config::B2Config;

const BACKEND: &str = "b2";

pub struct B2Backend {
    config: B2Config,
    client: reqwest::Client,
    max_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Authorization {
    authorization_token: String,
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTarget {
    bucket_id: String,
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedObject {
    file_id: String,
    file_name: String,
}

impl B2Backend {
    pub const fn new(config: B2Config, client: reqwest::Client, max_size: u64) -> Self {
        Self {
            config,
            client,
            max_size,
        }
    }

    async fn authorize(&self) -> Result<Authorization, UploadError> {
        let url = format!(
            "{}/b2api/v2/b2_authorize_account",
            self.config.api_base.trim_end_matches('/')
        );
        let request = self
            .client
            .get(url)
            .basic_auth(&self.config.key_id, Some(&self.config.application_key));
        parse_json(send_checked(BACKEND, request).await?).await
    }

    async fn upload_target(&self, auth: &Authorization) -> Result<UploadTarget, UploadError> {
        let url = format!(
            "{}/b2api/v2/b2_get_upload_url",
            auth.api_url.trim_end_matches('/')
        );
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, &auth.authorization_token)
            .json(&serde_json::json!({ "bucketId": self.config.bucket_id }));
        parse_json(send_checked(BACKEND, request).await?).await
    }

    fn download_base<'a>(&'a self, auth: &'a Authorization) -> &'a str {
        self.config
            .download_url
            .as_deref()
            .unwrap_or(&auth.download_url)
            .trim_end_matches('/')
    }

    fn public_url(&self, auth: &Authorization, object: &UploadedObject) -> String {
        let base = self.download_base(auth);
        if self.config.bucket_name.is_empty() {
            format!(
                "{base}/b2api/v2/b2_download_file_by_id?fileId={}",
                object.file_id
            )
        } else {
            format!("{base}/file/{}/{}", self.config.bucket_name, object.file_name)
        }
    }
}

#[async_trait]
impl UploadBackend for B2Backend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn max_size(&self) -> u64 {
        self.max_size
    }

    async fn put(&self, file: &UploadedFile) -> Result<StoredUpload, UploadError> {
        let auth = self.authorize().await?;
        let target = self.upload_target(&auth).await?;
        let path = object_path(&self.config.path_prefix, file);

        let request = self
            .client
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", &path)
            .header(CONTENT_TYPE, &file.content_type)
            .header("X-Bz-Content-Sha1", "do_not_verify")
            .body(file.data.clone());
        let object: UploadedObject = parse_json(send_checked(BACKEND, request).await?).await?;

        Ok(StoredUpload {
            url: self.public_url(&auth, &object),
            key: object.file_name,
        })
    }

    async fn upload_credentials(&self) -> Result<UploadCredentials, UploadError> {
        let auth = self.authorize().await?;
        let target = self.upload_target(&auth).await?;
        Ok(UploadCredentials {
            authorization_token: target.authorization_token,
            upload_url: target.upload_url,
            api_url: auth.api_url,
            bucket_id: target.bucket_id,
        })
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, UploadError> {
    resp.json()
        .await
        .map_err(|source| UploadError::Request {
            backend: BACKEND,
            source,
        })
}
