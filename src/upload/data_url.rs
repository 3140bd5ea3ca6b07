// `data:` URL decoding for attachments posted inline by the form client

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hyper::body::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a data URL")]
    NotDataUrl,
    #[error("only base64 data URLs are supported")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// Parse `data:<mime>;base64,<payload>` into the media type and bytes.
/// A missing media type means `text/plain`.
pub fn parse_data_url(input: &str) -> Result<(String, Bytes), DataUrlError> {
    let rest = input
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUrlError::NotDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotDataUrl)?;

    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(DataUrlError::NotBase64);
    }

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let data = BASE64
        .decode(payload)
        .map_err(|e| DataUrlError::Decode(e.to_string()))?;

    let media_type = if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type.to_ascii_lowercase()
    };
    Ok((media_type, Bytes::from(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image() {
        let (mime, data) = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(&data[..], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_default_media_type() {
        let (mime, data) = parse_data_url("data:;base64,aGk=").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(&data[..], b"hi");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_data_url("hello"), Err(DataUrlError::NotDataUrl));
        assert_eq!(parse_data_url("data:image/png;base64"), Err(DataUrlError::NotDataUrl));
        assert_eq!(parse_data_url("data:text/plain,hi"), Err(DataUrlError::NotBase64));
        assert!(matches!(
            parse_data_url("data:image/png;base64,!!!"),
            Err(DataUrlError::Decode(_))
        ));
    }
}
