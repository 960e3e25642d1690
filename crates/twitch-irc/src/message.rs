//! Decoding of raw IRC lines into chat events.
//!
//! Line shape: `[@tags ][:prefix ]COMMAND params[ :trailing]`. Only the
//! pieces needed for chat monitoring are interpreted; everything else is
//! classified and left to the caller.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::Tags;

const PRIVMSG: &str = "PRIVMSG";
const DEFAULT_PING_PAYLOAD: &str = ":tmi.twitch.tv";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A chat message posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Process-wide, strictly increasing in decode order.
    pub id: u64,
    pub channel: String,
    pub username: String,
    pub display_name: String,
    pub text: String,
    pub is_subscriber: bool,
    pub is_moderator: bool,
    pub badges: BTreeSet<String>,
    pub is_mention_of_channel: bool,
    pub received_at: DateTime<Utc>,
}

impl ChatEvent {
    /// Build an untagged event received now.
    pub fn new(
        channel: impl Into<String>,
        username: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::from_parts(channel.into(), username.into(), text.into(), Tags::default())
    }

    fn from_parts(channel: String, username: String, text: String, tags: Tags) -> Self {
        let channel = channel.to_lowercase();
        let is_mention_of_channel = is_mention(&text, &channel);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            display_name: tags.display_name.unwrap_or_else(|| username.clone()),
            is_subscriber: tags.subscriber,
            is_moderator: tags.moderator,
            badges: tags.badges,
            is_mention_of_channel,
            received_at: Utc::now(),
            channel,
            username,
            text,
        }
    }
}

/// Case-insensitive literal substring check for `@channel`.
///
/// Matches `@shroudfan` for channel `shroud` too; no word boundary applies.
pub fn is_mention(text: &str, channel: &str) -> bool {
    let needle = format!("@{}", channel.to_lowercase());
    text.to_lowercase().contains(&needle)
}

/// Classification of a single protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcLine {
    /// Keep-alive probe; the payload must be echoed back in a `PONG`.
    Ping(String),
    /// Capability or login acknowledgement (`CAP * ACK`, numeric replies).
    Acknowledgement,
    /// The server asks the client to reconnect.
    Reconnect,
    Chat(ChatEvent),
    /// A `PRIVMSG` line that could not be decoded.
    Malformed,
    Ignored,
}

/// Decode a line into a chat event. Non-chat and malformed lines yield `None`.
pub fn decode(line: &str) -> Option<ChatEvent> {
    match parse_line(line) {
        IrcLine::Chat(event) => Some(event),
        _ => None,
    }
}

/// Classify one protocol line. Never fails.
pub fn parse_line(line: &str) -> IrcLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return IrcLine::Ignored;
    }

    if let Some(rest) = line.strip_prefix("PING") {
        if rest.is_empty() || rest.starts_with(' ') {
            let payload = rest.trim_start();
            let payload = if payload.is_empty() {
                DEFAULT_PING_PAYLOAD
            } else {
                payload
            };
            return IrcLine::Ping(payload.to_string());
        }
    }

    let (tags, rest) = split_tags(line);
    let (prefix, rest) = split_prefix(rest);
    let command = rest.split(' ').next().unwrap_or_default();

    match command {
        PRIVMSG => parse_privmsg(tags, prefix, &rest[PRIVMSG.len()..])
            .map_or(IrcLine::Malformed, IrcLine::Chat),
        "CAP" => IrcLine::Acknowledgement,
        "RECONNECT" => IrcLine::Reconnect,
        c if c.len() == 3 && c.bytes().all(|b| b.is_ascii_digit()) => IrcLine::Acknowledgement,
        _ => IrcLine::Ignored,
    }
}

fn split_tags(line: &str) -> (Option<&str>, &str) {
    match line.strip_prefix('@') {
        Some(tagged) => match tagged.split_once(' ') {
            Some((tags, rest)) => (Some(tags), rest.trim_start()),
            None => (Some(tagged), ""),
        },
        None => (None, line),
    }
}

fn split_prefix(line: &str) -> (Option<&str>, &str) {
    match line.strip_prefix(':') {
        Some(prefixed) => match prefixed.split_once(' ') {
            Some((prefix, rest)) => (Some(prefix), rest.trim_start()),
            None => (Some(prefixed), ""),
        },
        None => (None, line),
    }
}

/// `params` is everything after the command token, e.g. ` #chan :body`.
fn parse_privmsg(tags: Option<&str>, prefix: Option<&str>, params: &str) -> Option<ChatEvent> {
    let (username, _) = prefix?.split_once('!')?;
    if username.is_empty() {
        return None;
    }

    // The body starts after the first " :" following the command; the body
    // itself may contain further colons.
    let body_start = params.find(" :")?;
    let target = params[..body_start].trim();
    let text = &params[body_start + 2..];

    if target.contains(' ') {
        return None;
    }
    let channel = target.strip_prefix('#')?;
    if channel.is_empty() {
        return None;
    }

    let tags = tags.map(Tags::parse).unwrap_or_default();
    Some(ChatEvent::from_parts(
        channel.to_string(),
        username.to_string(),
        text.to_string(),
        tags,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHROUD_LINE: &str = "@display-name=Bob;subscriber=1;badges=subscriber/1 :bob!bob@bob.tmi PRIVMSG #shroud :hello @shroud world";

    #[test]
    fn decodes_tagged_chat_line() {
        let event = decode(SHROUD_LINE).expect("chat event");
        assert_eq!(event.channel, "shroud");
        assert_eq!(event.username, "bob");
        assert_eq!(event.display_name, "Bob");
        assert_eq!(event.text, "hello @shroud world");
        assert!(event.is_subscriber);
        assert!(!event.is_moderator);
        assert_eq!(event.badges, BTreeSet::from(["subscriber".to_string()]));
        assert!(event.is_mention_of_channel);
    }

    #[test]
    fn body_keeps_embedded_colons() {
        let line = "@display-name=a:b :alice!alice@alice.tmi.twitch.tv PRIVMSG #Chan :time is 12:30 :) see http://x";
        let event = decode(line).expect("chat event");
        assert_eq!(event.username, "alice");
        assert_eq!(event.channel, "chan");
        assert_eq!(event.text, "time is 12:30 :) see http://x");
        assert_eq!(event.display_name, "a:b");
    }

    #[test]
    fn untagged_line_uses_defaults() {
        let event =
            decode(":carol!carol@carol.tmi.twitch.tv PRIVMSG #room :hi\r\n").expect("chat event");
        assert_eq!(event.display_name, "carol");
        assert_eq!(event.text, "hi");
        assert!(!event.is_subscriber);
        assert!(!event.is_moderator);
        assert!(event.badges.is_empty());
        assert!(!event.is_mention_of_channel);
    }

    #[test]
    fn empty_body_is_allowed() {
        let event = decode(":dave!dave@dave PRIVMSG #room :").expect("chat event");
        assert_eq!(event.text, "");
    }

    #[test]
    fn missing_prefix_yields_none() {
        assert_eq!(decode("PRIVMSG #room :hello"), None);
        assert_eq!(decode("@mod=1 PRIVMSG #room :hello"), None);
        assert_eq!(decode(":tmi.twitch.tv PRIVMSG #room :hello"), None);
        assert_eq!(decode(":!host PRIVMSG #room :hello"), None);
        assert_eq!(parse_line("PRIVMSG #room :hello"), IrcLine::Malformed);
    }

    #[test]
    fn missing_target_or_body_yields_none() {
        assert_eq!(decode(":eve!eve@eve PRIVMSG #room"), None);
        assert_eq!(decode(":eve!eve@eve PRIVMSG room :no hash"), None);
        assert_eq!(decode(":eve!eve@eve PRIVMSG # :empty channel"), None);
        assert_eq!(decode(":eve!eve@eve PRIVMSG #a #b :two targets"), None);
    }

    #[test]
    fn classifies_control_lines() {
        assert_eq!(parse_line("PING :tmi.twitch.tv"), IrcLine::Ping(":tmi.twitch.tv".into()));
        assert_eq!(parse_line("PING"), IrcLine::Ping(":tmi.twitch.tv".into()));
        assert_eq!(
            parse_line(":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/commands"),
            IrcLine::Acknowledgement
        );
        assert_eq!(
            parse_line(":tmi.twitch.tv 001 justinfan12345 :Welcome, GLHF!"),
            IrcLine::Acknowledgement
        );
        assert_eq!(parse_line(":tmi.twitch.tv RECONNECT"), IrcLine::Reconnect);
        assert_eq!(
            parse_line(":justinfan12345!justinfan12345@justinfan12345.tmi.twitch.tv JOIN #room"),
            IrcLine::Ignored
        );
        assert_eq!(parse_line("PINGPONG"), IrcLine::Ignored);
        assert_eq!(parse_line(""), IrcLine::Ignored);
    }

    #[test]
    fn chat_text_mentioning_ping_is_still_chat() {
        let event = decode(":f!f@f PRIVMSG #room :PING :tmi.twitch.tv").expect("chat event");
        assert_eq!(event.text, "PING :tmi.twitch.tv");
    }

    #[test]
    fn ids_increase_in_decode_order() {
        let ids: Vec<u64> = (0..5)
            .map(|i| decode(&format!(":a!a@a PRIVMSG #room :m{i}")).expect("chat event").id)
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ChatEvent::new("room", "a", "later").id > ids[4]);
    }

    #[test]
    fn mention_is_case_insensitive_substring() {
        assert!(is_mention("Hey @SHROUD!", "shroud"));
        assert!(is_mention("hi @shroudfan", "shroud"));
        assert!(!is_mention("shroud without at", "shroud"));
        assert!(!is_mention("@shrou", "shroud"));

        let event = ChatEvent::new("Shroud", "bob", "yo @Shroud");
        assert_eq!(event.channel, "shroud");
        assert!(event.is_mention_of_channel);
    }
}
