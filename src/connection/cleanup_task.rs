use chrono::Utc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::shared::{FanoutError, ServerContext};

/// Starts the background task that prunes connections stuck before `connection_init`
#[instrument(skip(context, config))]
pub async fn start_cleanup_task(context: ServerContext, config: ServerConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        handshake_timeout_secs = config.handshake_timeout.as_secs(),
        "Starting pending-handshake cleanup task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        match sweep_pending_connections(&context, config.handshake_timeout).await {
            Ok(0) => {}
            Ok(pruned) => info!(pruned = pruned, "Pending-handshake cleanup completed"),
            Err(e) => error!(error = %e, "Pending-handshake cleanup failed"),
        }
    }
}

/// Remove every uninitialized connection older than `handshake_timeout`
///
/// Returns how many connections were pruned. A connection that fails to
/// prune is logged and skipped.
pub async fn sweep_pending_connections(
    context: &ServerContext,
    handshake_timeout: Duration,
) -> Result<usize, FanoutError> {
    let threshold = chrono::Duration::from_std(handshake_timeout)
        .map_err(|e| FanoutError::Storage(format!("invalid handshake timeout: {}", e)))?;
    let now = Utc::now();

    let mut pruned = 0;
    for connection in context.registry.connections().await? {
        if connection.is_initialized() || now - connection.created_at < threshold {
            continue;
        }

        let result = async {
            context
                .index
                .unsubscribe_all_by_connection_id(&connection.id)
                .await?;
            context.registry.unregister(&connection).await
        }
        .await;

        match result {
            Ok(()) => {
                context.registry.close(&connection);
                pruned += 1;
                info!(connection_id = %connection.id, "Pruned connection that never initialized");
            }
            Err(e) => {
                warn!(connection_id = %connection.id, error = %e, "Failed to prune connection");
            }
        }
    }

    Ok(pruned)
}
