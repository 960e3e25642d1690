//! Read-only Twitch chat client with channel subscriptions.
//!
//! Connects to the chat WebSocket endpoint, authenticates anonymously,
//! joins every subscribed channel and hands decoded chat events to a
//! [`ChatSink`]. Lost connections are retried with a linear back-off until
//! the attempt budget is spent; the subscription set survives reconnects
//! and [`IrcClient::stop`].

mod connection;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ChatEvent, IrcError};

pub const DEFAULT_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
pub const ANONYMOUS_NICK: &str = "justinfan12345";
pub const ANONYMOUS_PASS: &str = "SCHMOOPIIE";
const CAPABILITIES: &str = "twitch.tv/tags twitch.tv/commands";
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(360);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters, fixed for the lifetime of a client.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub url: String,
    pub nick: String,
    pub pass: String,
    /// Delay unit for reconnects: attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
    /// A connection with no inbound traffic for this long is considered dead.
    pub read_timeout: Duration,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_IRC_URL.into(),
            nick: ANONYMOUS_NICK.into(),
            pass: ANONYMOUS_PASS.into(),
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl IrcConfig {
    fn validate(&self) -> Result<(), IrcError> {
        let url = url::Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(IrcError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Lines sent right after the socket opens, before any JOIN.
    fn handshake_lines(&self) -> [String; 3] {
        [
            format!("PASS {}", self.pass),
            format!("NICK {}", self.nick),
            format!("CAP REQ :{CAPABILITIES}"),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

/// Point-in-time view of the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub subscribed_channel_count: usize,
    pub reconnect_attempts: u32,
    /// Set once the retry budget is spent; cleared by [`IrcClient::start`].
    pub reconnect_exhausted: bool,
}

/// Receiver of everything the client produces.
///
/// Called synchronously from the connection task, so implementations must
/// not block.
pub trait ChatSink: Send + Sync + 'static {
    fn on_chat(&self, event: ChatEvent);

    fn on_subscribed(&self, _channel: &str) {}

    fn on_unsubscribed(&self, _channel: &str) {}

    fn on_status(&self, _status: &ClientStatus) {}
}

/// Anonymous Twitch chat client. Cheap to clone.
#[derive(Clone)]
pub struct IrcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: IrcConfig,
    sink: Arc<dyn ChatSink>,
    subscriptions: Mutex<Subscriptions>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    exhausted: AtomicBool,
    task: Mutex<Option<RunningTask>>,
}

/// Channel set plus the command queue of the live connection. Kept under one
/// lock so the rejoin on connect and a concurrent subscribe never both miss
/// (or both send) a JOIN.
struct Subscriptions {
    channels: BTreeSet<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl IrcClient {
    pub fn new(config: IrcConfig, sink: Arc<dyn ChatSink>) -> Result<Self, IrcError> {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                sink,
                subscriptions: Mutex::new(Subscriptions {
                    channels: BTreeSet::new(),
                    outbound: None,
                }),
                state,
                attempts: AtomicU32::new(0),
                exhausted: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        })
    }

    /// Spawn the connection task. No-op while a task is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = lock(&self.inner.task);
        // An exhausted loop is already on its way out; replace it.
        let running = task
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished());
        if running && !self.inner.exhausted.load(Ordering::SeqCst) {
            tracing::debug!("IRC client already running");
            return;
        }

        self.inner.attempts.store(0, Ordering::SeqCst);
        self.inner.exhausted.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::run_loop(self.inner.clone(), cancel.clone()));
        *task = Some(RunningTask { cancel, handle });
        tracing::info!("IRC client started");
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Subscriptions are kept so a later [`start`](Self::start) rejoins them.
    pub async fn stop(&self) {
        let running = lock(&self.inner.task).take();
        if let Some(RunningTask { cancel, mut handle }) = running {
            cancel.cancel();
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("IRC client did not stop in time; aborting task");
                handle.abort();
            }
        }
        self.inner.detach_outbound();
        self.inner.set_state(ConnectionState::Disconnected);
        tracing::info!("IRC client stopped");
    }

    /// Add a channel. Returns `Ok(false)` if it was already subscribed.
    pub fn subscribe(&self, channel: &str) -> Result<bool, IrcError> {
        let channel = normalize_channel(channel)?;
        {
            let mut subs = lock(&self.inner.subscriptions);
            if !subs.channels.insert(channel.clone()) {
                return Ok(false);
            }
            if let Some(outbound) = &subs.outbound {
                let _ = outbound.send(format!("JOIN #{channel}"));
            }
        }
        self.inner.sink.on_subscribed(&channel);
        tracing::info!(channel = %channel, "Subscribed to channel");
        Ok(true)
    }

    /// Remove a channel. Returns `Ok(false)` if it was not subscribed.
    pub fn unsubscribe(&self, channel: &str) -> Result<bool, IrcError> {
        let channel = normalize_channel(channel)?;
        {
            let mut subs = lock(&self.inner.subscriptions);
            if !subs.channels.remove(&channel) {
                return Ok(false);
            }
            if let Some(outbound) = &subs.outbound {
                let _ = outbound.send(format!("PART #{channel}"));
            }
        }
        self.inner.sink.on_unsubscribed(&channel);
        tracing::info!(channel = %channel, "Unsubscribed from channel");
        Ok(true)
    }

    /// Subscribed channels in sorted order.
    pub fn channels(&self) -> Vec<String> {
        lock(&self.inner.subscriptions).channels.iter().cloned().collect()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        normalize_channel(channel)
            .map(|c| lock(&self.inner.subscriptions).channels.contains(&c))
            .unwrap_or(false)
    }

    pub fn status(&self) -> ClientStatus {
        self.inner.status()
    }

    /// Watch connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    async fn run_loop(inner: Arc<ClientInner>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let result = inner.connect_once(&cancel).await;
            inner.detach_outbound();
            inner.set_state(ConnectionState::Disconnected);

            match result {
                Ok(connection::Disconnect::Shutdown) => {
                    tracing::info!("IRC connection closed cleanly");
                    return;
                }
                Ok(connection::Disconnect::Reconnect) => {
                    tracing::info!("IRC server requested reconnect");
                }
                Err(e) => {
                    let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt > inner.config.max_attempts {
                        inner.exhausted.store(true, Ordering::SeqCst);
                        tracing::error!(
                            error = %e,
                            max_attempts = inner.config.max_attempts,
                            "IRC reconnect attempts exhausted; waiting for explicit start"
                        );
                        inner.sink.on_status(&inner.status());
                        return;
                    }
                    let backoff = backoff_duration(inner.config.base_delay, attempt);
                    tracing::warn!(
                        error = %e, attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "IRC connection failed, will reconnect"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("IRC shutdown requested during reconnect backoff");
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }
}

impl ClientInner {
    fn status(&self) -> ClientStatus {
        let state = *self.state.borrow();
        ClientStatus {
            state,
            connected: state == ConnectionState::Ready,
            subscribed_channel_count: lock(&self.subscriptions).channels.len(),
            reconnect_attempts: self.attempts.load(Ordering::SeqCst),
            reconnect_exhausted: self.exhausted.load(Ordering::SeqCst),
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            tracing::debug!(state = ?next, "IRC state changed");
            self.sink.on_status(&self.status());
        }
    }

    /// Queue a JOIN for every subscribed channel and publish the command
    /// queue so later subscribe/unsubscribe calls go straight to the wire.
    fn attach_outbound(&self, outbound: mpsc::UnboundedSender<String>) -> usize {
        let mut subs = lock(&self.subscriptions);
        for channel in &subs.channels {
            let _ = outbound.send(format!("JOIN #{channel}"));
        }
        subs.outbound = Some(outbound);
        subs.channels.len()
    }

    fn detach_outbound(&self) {
        lock(&self.subscriptions).outbound = None;
    }
}

/// Normalize a user-supplied channel name: trim, drop a leading `#`,
/// lower-case. Names with whitespace or control characters are rejected so
/// they cannot smuggle extra protocol commands.
pub fn normalize_channel(channel: &str) -> Result<String, IrcError> {
    let name = channel_name(channel);
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IrcError::InvalidChannel(channel.to_string()));
    }
    Ok(name)
}

/// Canonical key for a channel: trimmed, one leading `#` dropped,
/// lower-cased. Performs no validation.
pub fn channel_name(channel: &str) -> String {
    let trimmed = channel.trim();
    trimmed.strip_prefix('#').unwrap_or(trimmed).to_lowercase()
}

fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
