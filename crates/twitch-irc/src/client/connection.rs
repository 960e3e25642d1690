use std::sync::atomic::Ordering;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Msg;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::message::{IrcLine, parse_line};

/// Why a connection ended without an error.
pub(super) enum Disconnect {
    Shutdown,
    Reconnect,
}

enum LineAction {
    Continue,
    Reply(String),
    Reconnect,
}

impl ClientInner {
    /// Run one connection from dial to close.
    pub(super) async fn connect_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Disconnect, IrcError> {
        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "Connecting to Twitch IRC");

        let (ws, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(Disconnect::Shutdown),
            result = connect_async(self.config.url.as_str()) => result?,
        };
        let (mut write, mut read) = ws.split();

        self.set_state(ConnectionState::Authenticating);
        for line in self.config.handshake_lines() {
            write.send(Msg::text(format!("{line}\r\n"))).await?;
        }

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let joined = self.attach_outbound(outbound_tx);
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Ready);
        tracing::info!(channels = joined, "Twitch IRC ready");

        // Only inbound frames push the idle deadline back.
        let mut deadline = Instant::now() + self.config.read_timeout;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("IRC shutdown during listen");
                    let _ = write.send(Msg::Close(None)).await;
                    return Ok(Disconnect::Shutdown);
                }
                Some(command) = outbound_rx.recv() => {
                    tracing::debug!(command = %command, "Sending IRC command");
                    write.send(Msg::text(format!("{command}\r\n"))).await?;
                }
                frame = timeout_at(deadline, read.next()) => {
                    if matches!(frame, Ok(Some(Ok(_)))) {
                        deadline = Instant::now() + self.config.read_timeout;
                    }
                    match frame {
                        Ok(Some(Ok(Msg::Text(text)))) => {
                            for line in text.lines() {
                                match self.handle_line(line) {
                                    LineAction::Continue => {}
                                    LineAction::Reply(reply) => {
                                        write.send(Msg::text(format!("{reply}\r\n"))).await?;
                                    }
                                    LineAction::Reconnect => {
                                        let _ = write.send(Msg::Close(None)).await;
                                        return Ok(Disconnect::Reconnect);
                                    }
                                }
                            }
                        }
                        Ok(Some(Ok(Msg::Ping(data)))) => {
                            let _ = write.send(Msg::Pong(data)).await;
                        }
                        Ok(Some(Ok(Msg::Close(_)))) | Ok(None) => {
                            tracing::warn!("Twitch IRC WebSocket closed by server");
                            return Err(IrcError::Closed("server closed".into()));
                        }
                        Ok(Some(Err(e))) => return Err(IrcError::WebSocket(e)),
                        Ok(Some(Ok(_))) => {}
                        Err(_) => {
                            tracing::warn!("Twitch IRC read timeout");
                            return Err(IrcError::Timeout);
                        }
                    }
                }
            }
        }
    }

    fn handle_line(&self, line: &str) -> LineAction {
        match parse_line(line) {
            IrcLine::Ping(payload) => {
                tracing::trace!("IRC keepalive received");
                LineAction::Reply(format!("PONG {payload}"))
            }
            IrcLine::Chat(event) => {
                tracing::trace!(channel = %event.channel, user = %event.username, "Chat message");
                self.sink.on_chat(event);
                LineAction::Continue
            }
            IrcLine::Reconnect => LineAction::Reconnect,
            IrcLine::Acknowledgement => {
                tracing::debug!(line, "IRC acknowledgement");
                LineAction::Continue
            }
            IrcLine::Malformed => {
                tracing::debug!(line, "Dropping malformed chat line");
                LineAction::Continue
            }
            IrcLine::Ignored => LineAction::Continue,
        }
    }
}
