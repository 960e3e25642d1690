//! Headless chat monitor.
//!
//! Joins the channels listed in `IRC_CHANNELS`, logs every message and
//! periodic status, and runs until Ctrl+C.

use chat_monitor_lib::app::ChatMonitor;
use chat_monitor_lib::background;
use chat_monitor_lib::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Step 1: Tracing
    chat_monitor_lib::init_tracing();

    tracing::info!("Starting chat monitor");

    // Step 2: Foundation
    let config = chat_monitor_lib::init_foundation()?;
    let monitor = ChatMonitor::new(&config)?;

    // Step 3: Observers first so nothing is missed
    let m = monitor.clone();
    let console = tokio::spawn(async move { background::console_observer_loop(m).await });

    if let Some(interval) = config.status_log_interval {
        let m = monitor.clone();
        tokio::spawn(async move { background::status_log_loop(m, interval).await });
    }

    // Step 4: Channels and connection
    for channel in &config.channels {
        if let Err(e) = monitor.subscribe(channel) {
            tracing::warn!("Skipping channel {channel}: {e}");
        }
    }
    if config.channels.is_empty() {
        tracing::warn!("IRC_CHANNELS is empty; connected but not joined to any channel");
    }
    monitor.start();

    tracing::info!(
        channels = ?monitor.channels(),
        "Chat monitor running. Press Ctrl+C to stop."
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&monitor).await;
    let _ = console.await;
    Ok(())
}
