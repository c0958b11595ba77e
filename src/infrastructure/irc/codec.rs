//! IRCv3 line parsing.

use std::collections::HashMap;

use super::error::{IrcError, IrcResult};

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    /// IRCv3 message tags, values unescaped.
    pub tags: HashMap<String, String>,
    /// Message prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Command or numeric.
    pub command: String,
    /// Middle parameters followed by the trailing parameter, if any.
    pub params: Vec<String>,
}

impl IrcLine {
    /// Returns the trailing parameter (conventionally the message text).
    #[must_use]
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

/// Parses one line, without the terminating CRLF.
pub fn parse_line(line: &str) -> IrcResult<IrcLine> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    if rest.is_empty() {
        return Err(IrcError::Protocol("empty line".to_string()));
    }

    let mut tags = HashMap::new();
    if let Some(after) = rest.strip_prefix('@') {
        let (raw_tags, remainder) = after
            .split_once(' ')
            .ok_or_else(|| IrcError::Protocol(format!("tags without command: {line}")))?;
        for tag in raw_tags.split(';') {
            if tag.is_empty() {
                continue;
            }
            match tag.split_once('=') {
                Some((key, value)) => tags.insert(key.to_string(), unescape_tag_value(value)),
                None => tags.insert(tag.to_string(), String::new()),
            };
        }
        rest = remainder;
    }

    let mut prefix = None;
    if let Some(after) = rest.strip_prefix(':') {
        let (raw_prefix, remainder) = after
            .split_once(' ')
            .ok_or_else(|| IrcError::Protocol(format!("prefix without command: {line}")))?;
        prefix = Some(raw_prefix.to_string());
        rest = remainder;
    }

    let mut params = Vec::new();
    let command;
    match rest.split_once(' ') {
        None => command = rest.to_string(),
        Some((cmd, mut args)) => {
            command = cmd.to_string();
            loop {
                if let Some(trailing) = args.strip_prefix(':') {
                    params.push(trailing.to_string());
                    break;
                }
                match args.split_once(' ') {
                    Some((param, remainder)) => {
                        if !param.is_empty() {
                            params.push(param.to_string());
                        }
                        args = remainder;
                    }
                    None => {
                        if !args.is_empty() {
                            params.push(args.to_string());
                        }
                        break;
                    }
                }
            }
        }
    }

    if command.is_empty() {
        return Err(IrcError::Protocol(format!("missing command: {line}")));
    }

    Ok(IrcLine {
        tags,
        prefix,
        command,
        params,
    })
}

/// Unescapes an IRCv3 tag value.
#[must_use]
pub fn unescape_tag_value(value: &str) -> String {
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
            // A lone trailing backslash is dropped.
            None => {}
        }
    }
    out
}

/// Extracts the nick from a `nick!user@host` prefix.
#[must_use]
pub fn nick_from_prefix(prefix: &str) -> &str {
    prefix.split(['!', '@']).next().unwrap_or(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_privmsg() {
        let line = "@badge-info=;emotes=25:0-4,6-10;id=abc :nick!nick@nick.tmi.twitch.tv PRIVMSG #chan :Kappa Kappa";
        let parsed = parse_line(line).unwrap();

        assert_eq!(parsed.command, "PRIVMSG");
        assert_eq!(parsed.prefix.as_deref(), Some("nick!nick@nick.tmi.twitch.tv"));
        assert_eq!(parsed.params, vec!["#chan", "Kappa Kappa"]);
        assert_eq!(parsed.tags.get("emotes").unwrap(), "25:0-4,6-10");
        assert_eq!(parsed.tags.get("badge-info").unwrap(), "");
    }

    #[test]
    fn test_parse_ping() {
        let parsed = parse_line("PING :tmi.twitch.tv").unwrap();
        assert_eq!(parsed.command, "PING");
        assert_eq!(parsed.trailing(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_parse_numeric_welcome() {
        let parsed = parse_line(":tmi.twitch.tv 001 justinfan123 :Welcome, GLHF!").unwrap();
        assert_eq!(parsed.command, "001");
        assert_eq!(parsed.params[0], "justinfan123");
    }

    #[test]
    fn test_parse_join_echo() {
        let parsed =
            parse_line(":justinfan123!justinfan123@x.tmi.twitch.tv JOIN #somechan").unwrap();
        assert_eq!(parsed.command, "JOIN");
        assert_eq!(parsed.params, vec!["#somechan"]);
        assert_eq!(
            nick_from_prefix(parsed.prefix.as_deref().unwrap()),
            "justinfan123"
        );
    }

    #[test]
    fn test_unescape_tag_value() {
        assert_eq!(unescape_tag_value(r"a\sb"), "a b");
        assert_eq!(unescape_tag_value(r"x\:y"), "x;y");
        assert_eq!(unescape_tag_value(r"back\\slash"), r"back\slash");
        assert_eq!(unescape_tag_value(r"line\r\nbreak"), "line\r\nbreak");
        assert_eq!(unescape_tag_value(r"dangling\"), "dangling");
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert!(parse_line("").is_err());
        assert!(parse_line("@tags-only").is_err());
        assert!(parse_line(":prefix-only").is_err());
    }

    #[test]
    fn test_nick_from_prefix_server_name() {
        assert_eq!(nick_from_prefix("tmi.twitch.tv"), "tmi.twitch.tv");
    }
}
