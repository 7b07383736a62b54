use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use crate::server::AppState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Wait for in-flight reviews to finish, up to `server.shutdown_grace_secs`,
/// then close the review slots so queued webhook runs are dropped.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    tracing::info!("Starting graceful shutdown...");
    drain_reviews(state).await;
    state.review_slots.close();
}

async fn drain_reviews(state: &Arc<AppState>) {
    let total = state.config.server.max_concurrent_reviews;
    let in_flight = total.saturating_sub(state.review_slots.available_permits());
    if in_flight == 0 {
        tracing::info!("No in-flight reviews");
        return;
    }

    let grace = Duration::from_secs(state.config.server.shutdown_grace_secs);
    tracing::info!(
        count = in_flight,
        grace_secs = grace.as_secs(),
        "Waiting for in-flight reviews"
    );

    // Holding every slot means no review is running. Config validation keeps
    // the total within u32.
    let all_slots = u32::try_from(total).unwrap_or(u32::MAX);
    match tokio::time::timeout(grace, state.review_slots.acquire_many(all_slots)).await {
        Ok(Ok(_all)) => tracing::info!("Graceful shutdown complete"),
        Ok(Err(_)) => tracing::warn!("Review slots closed during shutdown"),
        Err(_) => tracing::warn!(
            grace_secs = grace.as_secs(),
            "Reviews still running after grace period, abandoning them"
        ),
    }
}
