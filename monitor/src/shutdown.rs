use std::time::Duration;

use tokio::time::sleep;

use crate::app::ChatMonitor;

pub async fn graceful_shutdown(monitor: &ChatMonitor) {
    tracing::info!("Shutdown sequence started");

    monitor.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    monitor.stop().await;
    tracing::info!("Shutdown: chat connection closed");

    // Let observers drain what was already queued.
    sleep(Duration::from_millis(200)).await;
    let status = monitor.status();
    tracing::info!(
        messages = status.message_count,
        uptime = %status.uptime,
        "Shutdown sequence completed"
    );
}
