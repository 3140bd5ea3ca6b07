// Connection handling module
// Accepts a single TCP connection and serves it with hyper

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::api;
use crate::config::{AppState, UPSTREAM_TIMEOUT};
use crate::logger;

/// Decrements the active connection counter when the connection task ends
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept a connection, enforcing `max_connections`, and serve it in a local task.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    let counter = &state.active_connections;

    // Increment first, then check, so concurrent accepts cannot overshoot
    let prev_count = counter.fetch_add(1, Ordering::SeqCst);
    let guard = ConnectionGuard(Arc::clone(counter));

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.cached_access_log.load(Ordering::Relaxed) {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(stream, peer_addr, Arc::clone(state), guard);
}

/// Upper bound for one connection: the slower socket timeout plus the time a
/// handler may spend waiting on GitHub, B2 or the hosted store
fn connection_deadline(read_timeout: u64, write_timeout: u64) -> Duration {
    Duration::from_secs(read_timeout.max(write_timeout)) + UPSTREAM_TIMEOUT
}

/// Serve one connection with keep-alive, a header read timeout and an
/// overall deadline.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    guard: ConnectionGuard,
) {
    tokio::task::spawn_local(async move {
        let _guard = guard;
        let io = TokioIo::new(stream);

        let perf = &state.config.performance;
        let timeout_duration = connection_deadline(perf.read_timeout, perf.write_timeout);

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(perf.read_timeout))
            .keep_alive(perf.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| api::handle_request(req, Arc::clone(&service_state), peer_addr)),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use crate::test_support::{test_config, test_state};
    use crate::upload::{StoredUpload, UploadBackend, UploadCredentials, UploadError, UploadedFile};
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    /// Backend whose upstream answers only after `delay`
    struct SlowBackend {
        delay: Duration,
    }

    #[async_trait]
    impl UploadBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn max_size(&self) -> u64 {
            1024
        }

        async fn put(&self, _file: &UploadedFile) -> Result<StoredUpload, UploadError> {
            tokio::time::sleep(self.delay).await;
            Ok(StoredUpload {
                url: "/slow".to_string(),
                key: "slow".to_string(),
            })
        }

        async fn upload_credentials(&self) -> Result<UploadCredentials, UploadError> {
            tokio::time::sleep(self.delay).await;
            Ok(UploadCredentials {
                authorization_token: "token".to_string(),
                upload_url: "https://upload".to_string(),
                api_url: "https://api".to_string(),
                bucket_id: "bucket".to_string(),
            })
        }
    }

    fn slow_state(delay: Duration) -> Arc<AppState> {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let uploader: Arc<dyn UploadBackend> = Arc::new(SlowBackend { delay });
        Arc::new(AppState::with_parts(test_config(), store, uploader))
    }

    async fn wait_for_release(state: &AppState) {
        for _ in 0..50 {
            if state.active_connections.load(Ordering::SeqCst) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_deadline_covers_upstream_timeout() {
        let deadline = connection_deadline(30, 10);
        assert_eq!(deadline, Duration::from_secs(30) + UPSTREAM_TIMEOUT);
        assert!(deadline > UPSTREAM_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_upstream_outlives_read_timeout() {
        let delay = Duration::from_secs(45);
        let state = slow_state(delay);
        assert!(Duration::from_secs(state.config.performance.read_timeout) < delay);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = TcpStream::connect(addr).await.unwrap();
                let (stream, peer) = listener.accept().await.unwrap();
                accept_connection(stream, peer, &state);

                let started = Instant::now();
                client
                    .write_all(b"GET /api/b2-auth HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut response = String::new();
                client.read_to_string(&mut response).await.unwrap();

                assert!(started.elapsed() >= delay);
                assert!(response.starts_with("HTTP/1.1 200"));
                assert!(response.contains("\"uploadUrl\":\"https://upload\""));

                wait_for_release(&state).await;
                assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_client_cut_at_header_timeout() {
        let state = test_state();
        let read_timeout = Duration::from_secs(state.config.performance.read_timeout);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = TcpStream::connect(addr).await.unwrap();
                let (stream, peer) = listener.accept().await.unwrap();
                let started = Instant::now();
                accept_connection(stream, peer, &state);

                // Send nothing; the server closes once the header timer fires
                let mut buf = Vec::new();
                let _ = client.read_to_end(&mut buf).await;

                let elapsed = started.elapsed();
                assert!(elapsed >= read_timeout);
                assert!(elapsed < connection_deadline(0, 0));

                wait_for_release(&state).await;
                assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_serves_request_and_releases_slot() {
        let state = test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut client = TcpStream::connect(addr).await.unwrap();
                let (stream, peer) = listener.accept().await.unwrap();
                accept_connection(stream, peer, &state);
                assert_eq!(state.active_connections.load(Ordering::SeqCst), 1);

                client
                    .write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut response = String::new();
                client.read_to_string(&mut response).await.unwrap();
                assert!(response.starts_with("HTTP/1.1 200"));
                assert!(response.ends_with("ok"));

                tokio::task::yield_now().await;
                for _ in 0..50 {
                    if state.active_connections.load(Ordering::SeqCst) == 0 {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);
            })
            .await;
    }
}
