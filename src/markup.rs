//! Inline extensions recognized inside markdown text.
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `[[William Blake]]` | mention of an entity |
//! | `[[William Blake\|Blake]]` | mention with a display label |
//! | `[12:34]` / `[1:02:03]` | timecode into the document's source media |
//! | `{#123}` | reference to an issue in the project tracker |
//! | `{A remark.}` | sidenote, numbered per document |
//!
//! Extensions are recognized in text only. Code spans and code blocks are
//! left untouched. A sidenote must close before the end of its text run and
//! be followed by whitespace; its content may hold mentions and timecodes.

use crate::utils::slug::entity_key;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Mention, timecode, issue and sidenote syntax in one pass. Issues come
/// before sidenotes so `{#12}` is never read as a sidenote; a sidenote may
/// contain issue references but no other braces.
static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[\[(?P<name>[^\[\]|\n]+)(?:\|(?P<label>[^\[\]\n]+))?\]\]",
        r"|\[(?P<timecode>[0-9]{1,2}:[0-9]{1,2}(?::[0-9]{1,2})?)\]",
        r"|\{#(?P<issue>[0-9]{1,9})\}",
        r"|\{(?P<sidenote>(?:[^{}\n]|\{#[0-9]{1,9}\})+)\}",
    ))
    .expect("inline extension regex is valid")
});

/// Markdown features enabled for every document.
pub fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline<'a> {
    Text(&'a str),
    Mention(Mention<'a>),
    Timecode(Timecode),
    Issue(u32),
    /// Raw sidenote content, without braces.
    Sidenote(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention<'a> {
    /// Entity key, see [`entity_key`].
    pub key: String,
    pub name: &'a str,
    /// Text shown in place of the mention.
    pub label: &'a str,
}

/// Position in the source media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl Timecode {
    /// Parse `mm:ss` or `hh:mm:ss`.
    pub fn parse(text: &str) -> Option<Self> {
        let parts = text
            .split(':')
            .map(|part| part.parse::<u8>().ok())
            .collect::<Option<Vec<_>>>()?;

        let (hours, minutes, seconds) = match parts[..] {
            [minutes, seconds] => (0, minutes, seconds),
            [hours, minutes, seconds] => (hours, minutes, seconds),
            _ => return None,
        };
        (minutes < 60 && seconds < 60).then_some(Self {
            hours,
            minutes,
            seconds,
        })
    }

    /// Link into the source media at this position.
    ///
    /// YouTube understands `#t=1h02m03s`; other players get `#t=01:02:03`.
    /// An existing fragment on `source_url` is replaced.
    pub fn href(&self, source_url: &str) -> String {
        let source_url = source_url
            .split_once('#')
            .map_or(source_url, |(base, _)| base);
        let host = source_url
            .split_once("://")
            .map_or(source_url, |(_, rest)| rest)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();

        if host.ends_with("youtube.com") || host.ends_with("youtu.be") {
            format!(
                "{source_url}#t={:0>2}h{:0>2}m{:0>2}s",
                self.hours, self.minutes, self.seconds
            )
        } else {
            format!("{source_url}#t={self}")
        }
    }

    /// Anchor id used for in-page links.
    pub fn anchor(&self) -> String {
        format!("t={self}")
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours > 0 {
            write!(f, "{:0>2}:", self.hours)?;
        }
        write!(f, "{:0>2}:{:0>2}", self.minutes, self.seconds)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Split text into plain runs and inline extensions.
///
/// Matches that fail validation (an out-of-range timecode, a mention whose
/// name has no slug, a blank sidenote or one glued to the next word) stay
/// plain text.
pub fn tokenize(text: &str) -> Vec<Inline<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in INLINE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        let token = if let Some(name) = caps.name("name") {
            let name = name.as_str().trim();
            let label = caps.name("label").map_or(name, |l| l.as_str().trim());
            let key = entity_key(name);
            (!key.is_empty()).then(|| Inline::Mention(Mention { key, name, label }))
        } else if let Some(timecode) = caps.name("timecode") {
            Timecode::parse(timecode.as_str()).map(Inline::Timecode)
        } else if let Some(issue) = caps.name("issue") {
            issue.as_str().parse().ok().map(Inline::Issue)
        } else {
            let detached = text[whole.end()..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace);
            caps.name("sidenote")
                .map(|note| note.as_str().trim())
                .filter(|note| detached && !note.is_empty())
                .map(Inline::Sidenote)
        };

        let Some(token) = token else {
            continue;
        };

        if whole.start() > last {
            tokens.push(Inline::Text(&text[last..whole.start()]));
        }
        tokens.push(token);
        last = whole.end();
    }

    if last < text.len() {
        tokens.push(Inline::Text(&text[last..]));
    }
    tokens
}

/// Parse markdown into events, merging adjacent text events.
///
/// The markdown parser splits unmatched brackets into separate text events;
/// merging lets [`tokenize`] see `[[Name]]` whole.
pub fn parse_events(markdown: &str) -> Vec<Event<'_>> {
    let mut events: Vec<Event> = Vec::new();

    for event in Parser::new_ext(markdown, options()) {
        if let Event::Text(text) = &event
            && let Some(Event::Text(previous)) = events.last_mut()
        {
            *previous = CowStr::from(format!("{previous}{text}"));
            continue;
        }
        events.push(event);
    }

    events
}

/// Entities mentioned in `markdown`, as `(key, name)` in order of appearance.
pub fn mentions(markdown: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut in_code = false;

    for event in parse_events(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Text(text) if !in_code => {
                for token in tokenize(&text) {
                    match token {
                        Inline::Mention(mention) => {
                            found.push((mention.key, mention.name.to_owned()));
                        }
                        Inline::Sidenote(note) => {
                            found.extend(tokenize(note).into_iter().filter_map(|inner| match inner {
                                Inline::Mention(mention) => {
                                    Some((mention.key, mention.name.to_owned()))
                                }
                                _ => None,
                            }));
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_plain_text() {
        assert_eq!(tokenize("just text"), vec![Inline::Text("just text")]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_tokenize_mention() {
        let tokens = tokenize("I read [[William Blake]] today");
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[1],
            Inline::Mention(Mention {
                key: "william-blake".into(),
                name: "William Blake",
                label: "William Blake",
            })
        );
    }

    #[test]
    fn test_tokenize_mention_with_label() {
        let tokens = tokenize("[[William Blake|Blake]]");
        assert_eq!(
            tokens,
            vec![Inline::Mention(Mention {
                key: "william-blake".into(),
                name: "William Blake",
                label: "Blake",
            })]
        );
    }

    #[test]
    fn test_tokenize_timecode_and_issue() {
        let tokens = tokenize("[01:02:03] see {#42}");
        assert_eq!(
            tokens,
            vec![
                Inline::Timecode(Timecode {
                    hours: 1,
                    minutes: 2,
                    seconds: 3
                }),
                Inline::Text(" see "),
                Inline::Issue(42),
            ]
        );
    }

    #[test]
    fn test_tokenize_sidenote() {
        let tokens = tokenize("Thyroid { See also [[Hans Selye]]. } matters");
        assert_eq!(
            tokens,
            vec![
                Inline::Text("Thyroid "),
                Inline::Sidenote("See also [[Hans Selye]]."),
                Inline::Text(" matters"),
            ]
        );
        assert_eq!(tokenize("{#7}"), vec![Inline::Issue(7)]);
        assert_eq!(tokenize("{see {#7}}"), vec![Inline::Sidenote("see {#7}")]);
    }

    #[test]
    fn test_tokenize_sidenote_must_be_detached() {
        assert_eq!(tokenize("{note}ed"), vec![Inline::Text("{note}ed")]);
        assert_eq!(tokenize("{ }"), vec![Inline::Text("{ }")]);
        assert_eq!(tokenize("end {note}"), vec![Inline::Text("end "), Inline::Sidenote("note")]);
    }

    #[test]
    fn test_tokenize_invalid_timecode_stays_text() {
        assert_eq!(tokenize("[12:99]"), vec![Inline::Text("[12:99]")]);
    }

    #[test]
    fn test_tokenize_unsluggable_mention_stays_text() {
        assert_eq!(tokenize("[[!!]]"), vec![Inline::Text("[[!!]]")]);
    }

    #[test]
    fn test_timecode_display() {
        let short = Timecode::parse("5:07").unwrap();
        assert_eq!(short.to_string(), "05:07");
        let long = Timecode::parse("1:05:07").unwrap();
        assert_eq!(long.to_string(), "01:05:07");
        assert_eq!(long.anchor(), "t=01:05:07");
    }

    #[test]
    fn test_timecode_href() {
        let tc = Timecode::parse("1:02:03").unwrap();
        assert_eq!(
            tc.href("https://www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc#t=01h02m03s"
        );
        assert_eq!(
            tc.href("https://example.com/audio.mp3"),
            "https://example.com/audio.mp3#t=01:02:03"
        );
        assert_eq!(
            tc.href("https://youtu.be/abc#t=5s"),
            "https://youtu.be/abc#t=01h02m03s"
        );
    }

    #[test]
    fn test_parse_events_merges_text() {
        let events = parse_events("see [[Blake]] now");
        let texts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Text(t) => Some(t.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["see [[Blake]] now"]);
    }

    #[test]
    fn test_mentions_skip_code() {
        let markdown = "About [[Blake]].\n\n```\n[[Not Indexed]]\n```\n\n`[[Inline Code]]` and [[Goethe|him]] {on [[Selye]]}\n";
        let found = mentions(markdown);
        assert_eq!(
            found,
            vec![
                ("blake".to_string(), "Blake".to_string()),
                ("goethe".to_string(), "Goethe".to_string()),
                ("selye".to_string(), "Selye".to_string()),
            ]
        );
    }
}
