// Graceful shutdown module
// Waits for in-flight connections after the listener has closed

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::config::AppState;
use crate::logger;

/// How often the connection counter is polled while draining
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wait until no connection is active or the grace period runs out.
///
/// Returns the number of connections still open at the end.
pub async fn drain_connections(state: &AppState) -> usize {
    let counter = &state.active_connections;
    logger::log_shutdown_started(counter.load(Ordering::SeqCst));

    let deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.config.performance.shutdown_grace);

    loop {
        let active = counter.load(Ordering::SeqCst);
        if active == 0 || tokio::time::Instant::now() >= deadline {
            logger::log_shutdown_complete(active);
            return active;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_returns_immediately_when_idle() {
        let state = test_state();
        assert_eq!(drain_connections(&state).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_grace() {
        let state = test_state();
        state.active_connections.store(2, Ordering::SeqCst);

        let started = tokio::time::Instant::now();
        assert_eq!(drain_connections(&state).await, 2);
        assert!(started.elapsed() >= Duration::from_secs(state.config.performance.shutdown_grace));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_connections_to_finish() {
        let state = test_state();
        state.active_connections.store(1, Ordering::SeqCst);

        let counter = std::sync::Arc::clone(&state.active_connections);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            counter.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(drain_connections(&state).await, 0);
    }
}
