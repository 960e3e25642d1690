//! Twitch chat ingestion over IRC-on-WebSocket.
//!
//! Provides the tagged IRC line decoder and a read-only, anonymous chat
//! client that keeps its channel subscriptions across reconnects.

pub mod client;
pub mod message;
pub mod tags;

pub use client::{
    ChatSink, ClientStatus, ConnectionState, IrcClient, IrcConfig, channel_name, normalize_channel,
};
pub use message::{ChatEvent, IrcLine, decode, parse_line};

/// Unified error type for the twitch-irc crate.
#[derive(Debug, thiserror::Error)]
pub enum IrcError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Unsupported URL scheme: {0} (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("Invalid channel name: {0:?}")]
    InvalidChannel(String),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("Connection timeout")]
    Timeout,
}
