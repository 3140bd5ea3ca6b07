// API error taxonomy
//
// Every handler failure ends up here and is rendered as
// `{"success":false,"error":"..."}` with the matching status.

use hyper::StatusCode;
use thiserror::Error;

use crate::http::BodyError;
use crate::messages::MessageError;
use crate::store::StoreError;
use crate::upload::{DataUrlError, UploadError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("file is {size} bytes, the limit is {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(u64),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) | Self::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::NotConfigured(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to clients; upstream and storage details stay in the logs
    pub fn user_message(&self) -> String {
        match self {
            Self::Upstream(_) => "Failed to upload file to external storage".to_string(),
            Self::Store(_) => "Storage error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the failure is ours rather than the client's
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<MessageError> for ApiError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::Validation(msg) => Self::Validation(msg),
            MessageError::Store(e) => Self::Store(e),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { size, limit } => Self::PayloadTooLarge { size, limit },
            UploadError::Store(e) => Self::Store(e),
            UploadError::NotConfigured(what) => {
                Self::NotConfigured(format!("{what} is not configured"))
            }
            e @ (UploadError::Upstream { .. } | UploadError::Request { .. }) => {
                Self::Upstream(e.to_string())
            }
        }
    }
}

impl From<BodyError> for ApiError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::TooLarge(limit) => Self::BodyTooLarge(limit),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<DataUrlError> for ApiError {
    fn from(e: DataUrlError) -> Self {
        Self::Validation(format!("imageData: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Validation(String::new()).status(), 400);
        assert_eq!(
            ApiError::PayloadTooLarge { size: 2, limit: 1 }.status(),
            400
        );
        assert_eq!(ApiError::BodyTooLarge(1).status(), 413);
        assert_eq!(ApiError::NotFound("file".into()).status(), 404);
        assert_eq!(ApiError::Upstream("x".into()).status(), 500);
        assert_eq!(
            ApiError::Store(StoreError::InvalidKey(String::new())).status(),
            500
        );
    }

    #[test]
    fn test_upstream_details_hidden() {
        let err = ApiError::from(UploadError::Upstream {
            backend: "github",
            status: 401,
            detail: "Bad credentials for token ghp_secret".to_string(),
        });
        assert!(err.is_server_error());
        assert!(!err.user_message().contains("ghp_secret"));
        assert!(err.to_string().contains("ghp_secret"));
    }

    #[test]
    fn test_too_large_maps_to_payload_error() {
        let err = ApiError::from(UploadError::TooLarge {
            size: 2_097_152,
            limit: 1_048_576,
        });
        assert!(matches!(err, ApiError::PayloadTooLarge { .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
