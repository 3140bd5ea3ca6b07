// API module entry
// Guestbook routes: messages, uploads, stored files and the landing page

mod error;
mod handlers;
mod homepage;
mod response;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppState, HealthConfig};
use crate::http;
use crate::logger::{self, AccessLogEntry};

pub use error::ApiError;
use handlers::HandlerResult;

const FILES_PREFIX: &str = "/api/files/";

/// Known paths; the method is checked after the path matches
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Index,
    Health,
    Messages,
    Submit,
    Upload,
    B2Auth,
    File(String),
}

impl Route {
    fn resolve(path: &str, health: &HealthConfig) -> Option<Self> {
        if health.enabled && (path == health.liveness_path || path == health.readiness_path) {
            return Some(Self::Health);
        }
        match path {
            "/" | "/index.html" => Some(Self::Index),
            "/api/messages" => Some(Self::Messages),
            "/api/submit" => Some(Self::Submit),
            "/api/upload" => Some(Self::Upload),
            "/api/b2-auth" => Some(Self::B2Auth),
            _ => path
                .strip_prefix(FILES_PREFIX)
                .filter(|id| !id.is_empty())
                .map(|id| Self::File(id.to_string())),
        }
    }

    /// Name used in access log lines
    const fn label(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Health => "health",
            Self::Messages => "messages",
            Self::Submit => "submit",
            Self::Upload => "upload",
            Self::B2Auth => "b2-auth",
            Self::File(_) => "file",
        }
    }

    /// Value of the `Allow` header for this path
    const fn allow(&self) -> &'static str {
        match self {
            Self::Index | Self::Health | Self::File(_) => "GET, HEAD, OPTIONS",
            Self::Messages => "GET, POST, OPTIONS",
            Self::Submit | Self::Upload => "POST, OPTIONS",
            Self::B2Auth => "GET, OPTIONS",
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Never fails: handler errors become the JSON failure envelope.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let access_log = state.cached_access_log.load(Ordering::Relaxed);
    let entry = access_log.then(|| access_entry(&req, peer_addr));
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut failure = None;
    let mut response = match dispatch(req, &state).await {
        Ok(resp) => resp,
        Err(e) => {
            let resp = response::error_response(&e);
            failure = Some(e.user_message());
            resp
        }
    };
    http::decorate(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );
    logger::log_api_request(method.as_str(), &path, response.status().as_u16());

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry.route = Route::resolve(&path, &state.config.health).map_or("-", |r| r.label());
        entry.upload_backend = state.uploader.name();
        entry.error = failure;
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(req: Request<B>, state: &AppState) -> HandlerResult
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    if method == Method::OPTIONS {
        return Ok(http::build_options_response(state.config.http.enable_cors));
    }

    let max_body_size = state.config.http.max_body_size;
    if declared_length(&req).is_some_and(|len| len > max_body_size) {
        return Err(ApiError::BodyTooLarge(max_body_size));
    }

    let Some(route) = Route::resolve(req.uri().path(), &state.config.health) else {
        return Err(ApiError::NotFound("route".to_string()));
    };
    let is_head = method == Method::HEAD;

    match (route, method) {
        (Route::Index, Method::GET | Method::HEAD) => Ok(homepage::serve_index(is_head)),
        (Route::Health, Method::GET | Method::HEAD) => Ok(http::build_health_response("ok")),
        (Route::Messages, Method::GET) => handlers::list_messages(state).await,
        (Route::Messages, Method::POST) => handlers::create_message(req, state).await,
        (Route::Submit, Method::POST) => handlers::submit_form(req, state).await,
        (Route::Upload, Method::POST) => handlers::upload_file(req, state).await,
        (Route::B2Auth, Method::GET) => handlers::b2_auth(state).await,
        (Route::File(id), Method::GET | Method::HEAD) => {
            handlers::get_file(&id, state, is_head).await
        }
        (route, method) => {
            logger::log_warning(&format!(
                "Method not allowed: {method} {}",
                req.uri().path()
            ));
            Ok(http::build_405_response(route.allow()))
        }
    }
}

/// Content-Length as sent by the client, when it parses
fn declared_length<B>(req: &Request<B>) -> Option<u64> {
    req.headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        v if v == Version::HTTP_10 => "1.0",
        v if v == Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}
