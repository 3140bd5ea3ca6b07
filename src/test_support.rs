// Test helpers: a loopback HTTP stub for upstream services and
// ready-made application state backed by the memory store.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{AppState, Config};
use crate::store::{KvStore, MemoryStore};
use crate::upload::{KvBackend, UploadBackend};

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    /// Path plus query string
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Serve `handler` on an ephemeral loopback port.
///
/// Returns the base URL and a channel receiving every request in order.
pub async fn spawn_stub<F>(handler: F) -> (String, mpsc::UnboundedReceiver<CapturedRequest>)
where
    F: Fn(&CapturedRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let tx = tx.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    let tx = tx.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body.collect().await.map(|b| b.to_bytes()).unwrap_or_default();
                        let captured = CapturedRequest {
                            method: parts.method,
                            path: parts
                                .uri
                                .path_and_query()
                                .map(ToString::to_string)
                                .unwrap_or_default(),
                            headers: parts.headers,
                            body,
                        };
                        let (status, reply) = handler(&captured);
                        let _ = tx.send(captured);
                        let resp = Response::builder()
                            .status(status)
                            .header("Content-Type", "application/json")
                            .body(Full::new(Bytes::from(reply)))
                            .unwrap();
                        Ok::<_, Infallible>(resp)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (base, rx)
}

/// Default configuration with the memory store selected
pub fn test_config() -> Config {
    let mut config = Config::load_from("does-not-exist/guestbook").unwrap();
    config.storage.backend = crate::config::StorageBackend::Memory;
    config.logging.access_log = false;
    config
}

/// State over a fresh memory store using the fallback uploader
pub fn test_state() -> Arc<AppState> {
    let config = test_config();
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let uploader: Arc<dyn UploadBackend> = Arc::new(KvBackend::new(
        Arc::clone(&store),
        config.upload.fallback_max_size,
    ));
    Arc::new(AppState::with_parts(config, store, uploader))
}
