//! Runtime application configuration loaded from the environment.

use std::time::Duration;

use twitch_irc::{IrcConfig, channel_name};

use super::defaults::get_default;
use super::validation::{split_list, validate_setting};

/// Runtime configuration populated from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub irc_url: String,
    pub irc_nick: String,
    pub irc_pass: String,
    pub channels: Vec<String>,
    pub history_capacity: usize,
    pub observer_queue_capacity: usize,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_attempts: u32,
    pub read_timeout: Duration,
    /// `None` disables the periodic status log.
    pub status_log_interval: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::resolve(|_| None)
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Invalid values fall back to their default with a warning, except
    /// `IRC_URL` which is fatal.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("IRC_URL") {
            validate_setting("IRC_URL", url.trim())
                .map_err(|reason| anyhow::anyhow!("IRC_URL {reason}"))?;
        }
        Ok(Self::resolve(lookup))
    }

    fn resolve<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let g = |key: &str| -> String {
            let default = get_default(key).unwrap_or_default();
            match lookup(key) {
                Some(value) => match validate_setting(key, value.trim()) {
                    Ok(()) => value.trim().to_string(),
                    Err(reason) => {
                        tracing::warn!(key, reason = %reason, "Invalid setting; using default");
                        default.to_string()
                    }
                },
                None => default.to_string(),
            }
        };

        let status_interval = parse_u64(&g("STATUS_LOG_INTERVAL_SECS"), 60);

        Self {
            irc_url: g("IRC_URL"),
            irc_nick: g("IRC_NICK"),
            irc_pass: g("IRC_PASS"),
            channels: split_list(&g("IRC_CHANNELS")).map(channel_name).collect(),
            history_capacity: parse_u64(&g("HISTORY_CAPACITY"), 1000) as usize,
            observer_queue_capacity: parse_u64(&g("OBSERVER_QUEUE_CAPACITY"), 256) as usize,
            reconnect_base_delay: Duration::from_millis(parse_u64(
                &g("RECONNECT_BASE_DELAY_MS"),
                1000,
            )),
            reconnect_max_attempts: parse_u64(&g("RECONNECT_MAX_ATTEMPTS"), 5) as u32,
            read_timeout: Duration::from_secs(parse_u64(&g("READ_TIMEOUT_SECS"), 360)),
            status_log_interval: (status_interval > 0)
                .then(|| Duration::from_secs(status_interval)),
        }
    }

    /// Connection parameters for the chat client.
    pub fn irc_config(&self) -> IrcConfig {
        IrcConfig {
            url: self.irc_url.clone(),
            nick: self.irc_nick.clone(),
            pass: self.irc_pass.clone(),
            base_delay: self.reconnect_base_delay,
            max_attempts: self.reconnect_max_attempts,
            read_timeout: self.read_timeout,
        }
    }
}

fn parse_u64(s: &str, default: u64) -> u64 {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}
