//! Speaker-turn recognition for conversation transcripts.
//!
//! A transcript is ordinary markdown in which a block may open with a
//! speaker prefix, an alphanumeric short name followed by a colon:
//!
//! ```text
//! RP: The thyroid is central to all of this, and when it
//!
//! KM: Right.
//!
//! RP: slows down, everything else follows.
//! ```
//!
//! # Architecture
//!
//! ```text
//! parse()
//!     │
//!     ├── fence_map()  ──► lines inside closed code fences are never speaker lines
//!     │
//!     ├── Segmenter    ──► Prose / RawTurn segments + structural diagnostics
//!     │
//!     └── TurnFold     ──► is_hello / can_retort derived left to right
//! ```
//!
//! A turn runs until the next line opened by a *different* speaker: at the
//! start of a block any prefix counts, inside a paragraph only a declared
//! speaker's prefix does. A repeated prefix of the current speaker at a block
//! start is stripped and continues the same turn.
//!
//! Structural problems (an unclosed fence, a dangling `[[`, an undeclared
//! speaker) never fail the document; they are collected as [`Diagnostic`]s.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    ops::Range,
};
use thiserror::Error;

/// Turns shorter than this (in characters) may retort.
pub const DEFAULT_RETORT_THRESHOLD: usize = 50;

/// Characters that end a sentence naturally. A turn ending in anything else
/// was cut off by the next speaker.
const TERMINATORS: &[char] = &['.', '!', '?', '…', '"', '\'', ')', ']', '”', '’', '»'];

/// Short name → full name, as declared in front matter.
pub type Speakers = BTreeMap<String, String>;

// ============================================================================
// Nodes
// ============================================================================

/// A top-level node of a parsed document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Markdown preceding the first speaker turn.
    Prose { text: String, span: Range<usize> },
    /// Markdown attributed to one speaker.
    Turn(SpeakerTurn),
}

impl Node {
    /// Markdown source of this node (speaker prefixes removed).
    pub fn text(&self) -> &str {
        match self {
            Self::Prose { text, .. } => text,
            Self::Turn(turn) => &turn.text,
        }
    }
}

/// A contiguous span of transcript text attributed to one speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerTurn {
    /// Code used in the source, e.g. `RP`.
    pub short_name: String,
    /// Full name from front matter; `None` for undeclared speakers.
    pub long_name: Option<String>,
    /// First turn by this speaker in the document.
    pub is_hello: bool,
    /// Short reply directly after a different speaker was cut off.
    pub can_retort: bool,
    /// Markdown of the turn with speaker prefixes stripped.
    pub text: String,
    /// Byte range within the body, prefix included.
    pub span: Range<usize>,
    /// 1-based line of the opening speaker prefix.
    pub line: usize,
}

impl SpeakerTurn {
    /// Name to display: full name when declared, raw label otherwise.
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.short_name)
    }
}

/// Whether `text` stops without a natural terminator.
///
/// Empty text is never considered interrupted.
pub fn is_interrupted(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| !TERMINATORS.contains(&c))
}

// ============================================================================
// Diagnostics
// ============================================================================

/// A non-fatal finding attached to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line within the parsed source.
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("speaker `{0}` is not declared in `speakers`")]
    UnknownSpeaker(String),

    #[error("turn by `{0}` has no text")]
    EmptyTurn(String),

    #[error("unterminated code fence in turn by `{0}`")]
    UnterminatedFence(String),

    #[error("unterminated mention in turn by `{0}`")]
    UnterminatedMention(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

// ============================================================================
// Turn fold
// ============================================================================

/// Flags derived for a single turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnFlags {
    pub is_hello: bool,
    pub can_retort: bool,
}

/// Accumulator threaded through the turns of one document.
///
/// [`TurnFold::flags`] is a pure function of the accumulator and the current
/// turn; [`TurnFold::observe`] advances it afterwards.
#[derive(Debug, Clone)]
pub struct TurnFold {
    threshold: usize,
    seen: HashSet<String>,
    /// Previous turn's speaker and whether it was cut off.
    previous: Option<(String, bool)>,
}

impl TurnFold {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            seen: HashSet::new(),
            previous: None,
        }
    }

    pub fn flags(&self, short_name: &str, text: &str) -> TurnFlags {
        let after_interruption = self
            .previous
            .as_ref()
            .is_some_and(|(speaker, interrupted)| speaker != short_name && *interrupted);

        TurnFlags {
            is_hello: !self.seen.contains(short_name),
            can_retort: after_interruption && text.trim().chars().count() < self.threshold,
        }
    }

    pub fn observe(&mut self, short_name: &str, text: &str) {
        self.seen.insert(short_name.to_owned());
        self.previous = Some((short_name.to_owned(), is_interrupted(text)));
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parsed body of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Transcript {
    pub fn turns(&self) -> impl Iterator<Item = &SpeakerTurn> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Turn(turn) => Some(turn),
            Node::Prose { .. } => None,
        })
    }
}

/// Parse `source` into prose and speaker turns in a single pass.
pub fn parse(source: &str, speakers: &Speakers, threshold: usize) -> Transcript {
    let Segmented {
        segments,
        mut diagnostics,
    } = segment(source, speakers);

    let mut fold = TurnFold::new(threshold);
    let mut undeclared = HashSet::new();

    let nodes = segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Prose { text, span } => Node::Prose { text, span },
            Segment::Turn(raw) => {
                let flags = fold.flags(&raw.short_name, &raw.text);
                fold.observe(&raw.short_name, &raw.text);

                let long_name = speakers.get(&raw.short_name).cloned();
                if long_name.is_none() && undeclared.insert(raw.short_name.clone()) {
                    diagnostics.push(Diagnostic {
                        line: raw.line,
                        kind: DiagnosticKind::UnknownSpeaker(raw.short_name.clone()),
                    });
                }

                Node::Turn(SpeakerTurn {
                    short_name: raw.short_name,
                    long_name,
                    is_hello: flags.is_hello,
                    can_retort: flags.can_retort,
                    text: raw.text,
                    span: raw.span,
                    line: raw.line,
                })
            }
        })
        .collect();

    diagnostics.sort_by_key(|d| d.line);
    Transcript { nodes, diagnostics }
}

/// Split a speaker prefix off `line`.
///
/// Returns the short name and the byte offset where the turn text begins.
fn speaker_prefix(line: &str) -> Option<(&str, usize)> {
    let colon = line.find(':')?;
    let name = &line[..colon];
    if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
        return None;
    }

    let after = &line[colon + 1..];
    if !after.chars().next()?.is_whitespace() {
        return None;
    }

    Some((name, colon + 1 + (after.len() - after.trim_start().len())))
}

/// Whether a `[[` on this line is never closed on the same line.
fn has_unterminated_mention(line: &str) -> bool {
    let mut rest = line;
    while let Some(open) = rest.find("[[") {
        rest = &rest[open + 2..];
        match rest.find("]]") {
            Some(close) => rest = &rest[close + 2..],
            None => return true,
        }
    }
    false
}

// ============================================================================
// Internal: lines and fences
// ============================================================================

struct Line<'a> {
    /// 1-based
    number: usize,
    start: usize,
    end: usize,
    text: &'a str,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut start = 0;
    source
        .split_inclusive('\n')
        .enumerate()
        .map(|(index, raw)| {
            let text = raw.trim_end_matches(['\n', '\r']);
            let line = Line {
                number: index + 1,
                start,
                end: start + text.len(),
                text,
            };
            start += raw.len();
            line
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fence {
    Outside,
    Open,
    Body,
    Close,
    /// An opener that is never closed; treated as plain text.
    Unclosed,
}

impl Fence {
    const fn is_fenced(self) -> bool {
        matches!(self, Self::Open | Self::Body | Self::Close)
    }
}

fn fence_map(lines: &[Line]) -> Vec<Fence> {
    let mut map = vec![Fence::Outside; lines.len()];
    let mut i = 0;

    while i < lines.len() {
        let Some((marker, len)) = fence_opener(lines[i].text) else {
            i += 1;
            continue;
        };

        match (i + 1..lines.len()).find(|&j| closes_fence(lines[j].text, marker, len)) {
            Some(j) => {
                map[i] = Fence::Open;
                map[i + 1..j].fill(Fence::Body);
                map[j] = Fence::Close;
                i = j + 1;
            }
            None => {
                map[i] = Fence::Unclosed;
                i += 1;
            }
        }
    }

    map
}

fn fence_opener(line: &str) -> Option<(char, usize)> {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        return None;
    }

    let marker = rest.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = rest.chars().take_while(|&c| c == marker).count();
    if len < 3 || (marker == '`' && rest[len..].contains('`')) {
        return None;
    }

    Some((marker, len))
}

fn closes_fence(line: &str, marker: char, len: usize) -> bool {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        return false;
    }

    let count = rest.chars().take_while(|&c| c == marker).count();
    count >= len && rest[count..].trim().is_empty()
}

// ============================================================================
// Internal: segmentation
// ============================================================================

struct RawTurn {
    short_name: String,
    text: String,
    span: Range<usize>,
    line: usize,
}

enum Segment {
    Prose { text: String, span: Range<usize> },
    Turn(RawTurn),
}

struct Segmented {
    segments: Vec<Segment>,
    diagnostics: Vec<Diagnostic>,
}

/// Segment currently being collected.
struct Pending {
    /// Speaker and line of the opening prefix; `None` for prose.
    speaker: Option<(String, usize)>,
    start: usize,
    end: usize,
    text: String,
}

#[derive(Default)]
struct Segmenter {
    segments: Vec<Segment>,
    diagnostics: Vec<Diagnostic>,
    pending: Option<Pending>,
}

impl Segmenter {
    fn current_speaker(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .and_then(|p| p.speaker.as_ref())
            .map(|(name, _)| name.as_str())
    }

    /// Whether a prefix inside a paragraph hands the turn to another speaker.
    fn interrupts(&self, name: &str, speakers: &Speakers) -> bool {
        self.current_speaker().is_some_and(|current| current != name)
            && speakers.contains_key(name)
    }

    /// A line opened by `name`; either continues or replaces the current turn.
    fn speaker_line(&mut self, name: &str, line: &Line, offset: usize) {
        if self.current_speaker() != Some(name) {
            self.finish();
            self.pending = Some(Pending {
                speaker: Some((name.to_owned(), line.number)),
                start: line.start,
                end: line.start,
                text: String::new(),
            });
        }
        self.append(line, offset);
    }

    fn line(&mut self, line: &Line) {
        if self.pending.is_none() {
            self.pending = Some(Pending {
                speaker: None,
                start: line.start,
                end: line.start,
                text: String::new(),
            });
        }
        self.append(line, 0);
    }

    fn append(&mut self, line: &Line, offset: usize) {
        if let Some(pending) = self.pending.as_mut() {
            pending.text.push_str(&line.text[offset..]);
            pending.text.push('\n');
            pending.end = line.end;
        }
    }

    fn diagnose(&mut self, line: &Line, kind: fn(String) -> DiagnosticKind) {
        if let Some(speaker) = self.current_speaker() {
            let kind = kind(speaker.to_owned());
            self.diagnostics.push(Diagnostic {
                line: line.number,
                kind,
            });
        }
    }

    fn finish(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let span = pending.start..pending.end;

        match pending.speaker {
            None => {
                let text = pending.text.trim_start_matches('\n').trim_end();
                if !text.is_empty() {
                    self.segments.push(Segment::Prose {
                        text: text.to_owned(),
                        span,
                    });
                }
            }
            Some((short_name, line)) => {
                let text = pending.text.trim().to_owned();
                if text.is_empty() {
                    self.diagnostics.push(Diagnostic {
                        line,
                        kind: DiagnosticKind::EmptyTurn(short_name.clone()),
                    });
                }
                self.segments.push(Segment::Turn(RawTurn {
                    short_name,
                    text,
                    span,
                    line,
                }));
            }
        }
    }

    fn into_segmented(mut self) -> Segmented {
        self.finish();
        Segmented {
            segments: self.segments,
            diagnostics: self.diagnostics,
        }
    }
}

fn segment(source: &str, speakers: &Speakers) -> Segmented {
    let lines = split_lines(source);
    let fences = fence_map(&lines);
    let mut segmenter = Segmenter::default();
    let mut block_start = true;

    for (line, fence) in lines.iter().zip(fences.iter().copied()) {
        let prefix = (!fence.is_fenced())
            .then(|| speaker_prefix(line.text))
            .flatten()
            .filter(|(name, _)| block_start || segmenter.interrupts(name, speakers));

        match prefix {
            Some((name, offset)) => segmenter.speaker_line(name, line, offset),
            None => segmenter.line(line),
        }

        if fence == Fence::Unclosed {
            segmenter.diagnose(line, DiagnosticKind::UnterminatedFence);
        }
        if !fence.is_fenced() && has_unterminated_mention(line.text) {
            segmenter.diagnose(line, DiagnosticKind::UnterminatedMention);
        }

        block_start = match fence {
            Fence::Open | Fence::Body => false,
            Fence::Close => true,
            Fence::Outside | Fence::Unclosed => line.text.trim().is_empty(),
        };
    }

    segmenter.into_segmented()
}

// ============================================================================
// Tests
// ============================================================================
