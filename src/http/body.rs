//! Request body reading
//!
//! Bodies are collected under a hard size limit, then decoded as JSON or
//! `multipart/form-data`.

use futures_util::stream;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use std::collections::HashMap;
use std::convert::Infallible;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(u64),

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("expected multipart/form-data")]
    NotMultipart,

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub struct FormFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Decoded `multipart/form-data` body
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<FormFile>,
}

impl FormData {
    /// Text field value; the first occurrence wins
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First file part sent under `field`
    pub fn take_file(&mut self, field: &str) -> Option<FormFile> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(idx))
    }
}

/// Collect a request body, failing once it grows past `limit` bytes
pub async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, BodyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyError::TooLarge(limit))
        }
        Err(e) => Err(BodyError::Read(e.to_string())),
    }
}

/// Decode an already collected `multipart/form-data` body
pub async fn parse_multipart(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<FormData, BodyError> {
    let boundary = content_type
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or(BodyError::NotMultipart)?;

    let chunks = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(chunks, boundary);
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await?;
            form.files.push(FormFile {
                field: name,
                filename,
                content_type,
                data,
            });
        } else {
            let value = field.text().await?;
            form.fields.entry(name).or_insert(value);
        }
    }

    Ok(form)
}
