//! IRCv3 message tag parsing (`@key=value;key2=value2`).

use std::collections::BTreeSet;

pub const DISPLAY_NAME: &str = "display-name";
pub const SUBSCRIBER: &str = "subscriber";
pub const MODERATOR: &str = "mod";
pub const BADGES: &str = "badges";

/// The subset of message tags the chat decoder cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub display_name: Option<String>,
    pub subscriber: bool,
    pub moderator: bool,
    pub badges: BTreeSet<String>,
}

impl Tags {
    /// Parse a raw tag block without the leading `@`.
    ///
    /// Unknown keys are skipped. A pair without `=` is treated as a key with
    /// an empty value.
    pub fn parse(raw: &str) -> Self {
        let mut tags = Self::default();
        for pair in raw.split(';') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                DISPLAY_NAME => {
                    let value = unescape_value(value);
                    tags.display_name = (!value.is_empty()).then_some(value);
                }
                SUBSCRIBER => tags.subscriber = value == "1",
                MODERATOR => tags.moderator = value == "1",
                BADGES => tags.badges = parse_badges(value),
                _ => {}
            }
        }
        tags
    }
}

/// `subscriber/12,vip/1` -> `{"subscriber", "vip"}`.
pub fn parse_badges(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .filter_map(|badge| {
            let id = badge.split('/').next().unwrap_or_default();
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

/// Undo IRCv3 tag value escaping.
pub fn unescape_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            // A trailing lone backslash is dropped.
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys_and_skips_unknown() {
        let tags = Tags::parse(
            "color=#FF0000;display-name=Bob;mod=1;subscriber=0;badges=moderator/1,subscriber/24",
        );
        assert_eq!(tags.display_name.as_deref(), Some("Bob"));
        assert!(tags.moderator);
        assert!(!tags.subscriber);
        assert_eq!(
            tags.badges.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["moderator", "subscriber"]
        );
    }

    #[test]
    fn empty_display_name_is_absent() {
        assert_eq!(Tags::parse("display-name=;subscriber=1").display_name, None);
        assert!(Tags::parse("display-name=;subscriber=1").subscriber);
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let tags = Tags::parse("display-name=a=b");
        assert_eq!(tags.display_name.as_deref(), Some("a=b"));
    }

    #[test]
    fn badges_collapse_duplicates_and_empty_entries() {
        let badges = parse_badges("vip/1,,vip/2,/3");
        assert_eq!(badges.len(), 1);
        assert!(badges.contains("vip"));
        assert!(parse_badges("").is_empty());
    }

    #[test]
    fn unescapes_ircv3_sequences() {
        assert_eq!(unescape_value(r"a\sb\:c\\d"), r"a b;c\d");
        assert_eq!(unescape_value("plain"), "plain");
        assert_eq!(unescape_value("trailing\\"), "trailing");
    }
}
