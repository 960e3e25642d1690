//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

use twitch_irc::client::{ANONYMOUS_NICK, ANONYMOUS_PASS, DEFAULT_IRC_URL};

type DefTuple = (&'static str, &'static str, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("IRC_URL", DEFAULT_IRC_URL, false, "Chat WebSocket endpoint (ws:// or wss://)"),
    ("IRC_NICK", ANONYMOUS_NICK, false, "Login nick; justinfan* logs in anonymously"),
    ("IRC_PASS", ANONYMOUS_PASS, true, "Login password sent with PASS"),
    ("IRC_CHANNELS", "", false, "Comma-separated channels joined at startup"),
    ("HISTORY_CAPACITY", "1000", false, "Messages retained per channel"),
    ("OBSERVER_QUEUE_CAPACITY", "256", false, "Undelivered messages buffered per observer"),
    ("RECONNECT_BASE_DELAY_MS", "1000", false, "Reconnect delay unit; attempt n waits n units"),
    ("RECONNECT_MAX_ATTEMPTS", "5", false, "Consecutive reconnect attempts before giving up"),
    ("READ_TIMEOUT_SECS", "360", false, "Idle seconds before the connection is considered dead"),
    ("STATUS_LOG_INTERVAL_SECS", "60", false, "Seconds between status log lines (0 disables)"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

/// Setting keys in declaration order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|&(key, ..)| key)
}
