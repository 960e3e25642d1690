//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?[A-Za-z0-9_]{1,25}$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "IRC_URL" => {
            let url = url::Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
            if url.scheme() != "ws" && url.scheme() != "wss" {
                return Err("must be a ws:// or wss:// URL".into());
            }
        }
        "IRC_NICK" => {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err("must be non-empty without whitespace".into());
            }
        }
        "IRC_PASS" => {
            if value.chars().any(char::is_whitespace) {
                return Err("must not contain whitespace".into());
            }
        }
        "IRC_CHANNELS" => {
            for channel in split_list(value) {
                if !RE_CHANNEL.is_match(channel) {
                    return Err(format!("invalid channel name '{channel}'"));
                }
            }
        }
        "HISTORY_CAPACITY" => validate_int_range(value, 1, 100_000)?,
        "OBSERVER_QUEUE_CAPACITY" => validate_int_range(value, 1, 65_536)?,
        "RECONNECT_BASE_DELAY_MS" => validate_int_range(value, 10, 60_000)?,
        "RECONNECT_MAX_ATTEMPTS" => validate_int_range(value, 1, 100)?,
        "READ_TIMEOUT_SECS" => validate_int_range(value, 10, 3600)?,
        "STATUS_LOG_INTERVAL_SECS" => validate_int_range(value, 0, 3600)?,
        _ => {}
    }
    Ok(())
}

/// Split a comma-separated list, dropping blank entries.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_url() {
        assert!(validate_setting("IRC_URL", "wss://irc-ws.chat.twitch.tv:443").is_ok());
        assert!(validate_setting("IRC_URL", "ws://127.0.0.1:9000").is_ok());
        assert!(validate_setting("IRC_URL", "https://irc-ws.chat.twitch.tv").is_err());
        assert!(validate_setting("IRC_URL", "not a url").is_err());
    }

    #[test]
    fn test_valid_channels() {
        assert!(validate_setting("IRC_CHANNELS", "").is_ok());
        assert!(validate_setting("IRC_CHANNELS", "shroud, #xQc ,pokimane").is_ok());
        assert!(validate_setting("IRC_CHANNELS", "bad name").is_err());
        assert!(validate_setting("IRC_CHANNELS", "ok,way_too_long_for_a_twitch_login").is_err());
    }

    #[test]
    fn test_valid_ranges() {
        assert!(validate_setting("HISTORY_CAPACITY", "1000").is_ok());
        assert!(validate_setting("HISTORY_CAPACITY", "0").is_err());
        assert!(validate_setting("RECONNECT_MAX_ATTEMPTS", "abc").is_err());
        assert!(validate_setting("STATUS_LOG_INTERVAL_SECS", "0").is_ok());
    }

    #[test]
    fn test_valid_nick() {
        assert!(validate_setting("IRC_NICK", "justinfan12345").is_ok());
        assert!(validate_setting("IRC_NICK", "").is_err());
        assert!(validate_setting("IRC_NICK", "a b").is_err());
    }
}
