// API response utility functions module
//
// Success: {"success":true,"data":...}
// Failure: {"success":false,"error":"..."}

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::error::ApiError;
use crate::logger;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from_static(
                    br#"{"success":false,"error":"Internal server error"}"#,
                )))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Error"))));
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// 200 with `data` wrapped in the success envelope
pub fn success<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &Envelope {
            success: true,
            data: Some(data),
            error: None,
        },
    )
}

/// Failure envelope for an `ApiError`; internal details are logged, not returned
pub fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    if err.is_server_error() {
        logger::log_error(&err.to_string());
    }
    json_response(
        err.status(),
        &Envelope::<()> {
            success: false,
            data: None,
            error: Some(err.user_message()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let resp = success(&serde_json::json!({"url": "/api/files/1"}));
        assert_eq!(resp.status(), 200);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["url"], "/api/files/1");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let resp = error_response(&ApiError::Validation(
            "name and content must not be empty".into(),
        ));
        assert_eq!(resp.status(), 400);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "name and content must not be empty");
        assert!(json.get("data").is_none());
    }
}
