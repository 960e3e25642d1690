//! Background task loops: periodic status log, console observer.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::app::ChatMonitor;
use crate::hub::HubMessage;

async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Log the status snapshot every `interval` until shutdown.
pub async fn status_log_loop(monitor: ChatMonitor, interval: Duration) {
    let shutdown_token = monitor.shutdown_token().clone();
    loop {
        if sleep_or_cancel(&shutdown_token, interval).await {
            tracing::info!("Status log loop stopped (shutdown)");
            return;
        }
        let status = monitor.status();
        tracing::info!(
            state = ?status.state,
            channels = status.channel_count,
            messages = status.message_count,
            uptime = %status.uptime,
            "Status"
        );
        if status.reconnect_exhausted {
            tracing::warn!("Chat connection gave up; restart required");
        }
    }
}

/// Print every hub message as a log line until shutdown.
pub async fn console_observer_loop(monitor: ChatMonitor) {
    let shutdown_token = monitor.shutdown_token().clone();
    let mut observer = monitor.register();
    loop {
        let message = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            message = observer.recv() => message,
        };
        let Some(message) = message else {
            break;
        };
        match message.as_ref() {
            HubMessage::ChatMessage(event) => {
                let marker = if event.is_mention_of_channel {
                    "[mention] "
                } else {
                    ""
                };
                tracing::info!(
                    channel = %event.channel,
                    "{marker}{}: {}",
                    event.display_name,
                    event.text
                );
            }
            HubMessage::ChannelUpdate(update) => {
                tracing::info!(
                    channel = %update.channel,
                    action = ?update.action,
                    "Channel update"
                );
            }
            HubMessage::ConnectionStatus(status) => {
                tracing::info!(
                    state = ?status.state,
                    connected = status.connected,
                    "Connection status"
                );
            }
        }
    }
    monitor.deregister(observer.id());
    if observer.dropped() > 0 {
        tracing::warn!(dropped = observer.dropped(), "Console observer fell behind");
    }
    tracing::info!("Console observer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_or_cancel_reports_cancellation() {
        let token = CancellationToken::new();
        assert!(!sleep_or_cancel(&token, Duration::from_millis(1)).await);
        token.cancel();
        assert!(sleep_or_cancel(&token, Duration::from_secs(60)).await);
    }
}
