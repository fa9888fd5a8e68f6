//! `<<keyword>>` markup formatter for VT100/ANSI terminals.
//!
//! This crate converts a lightweight markup into terminal escape sequences.
//! A markup span is `<<`, one or more style keywords separated by optional
//! whitespace, then `>>`. Each span becomes a single `ESC [ codes m`
//! sequence, or disappears entirely when the destination cannot render
//! escape codes.
//!
//! # Example
//!
//! ```rust
//! use cadence_markup::{format, Formatter, MarkupMode};
//!
//! // Escape codes for a capable terminal
//! assert_eq!(format("<<bold>> hi <<reset>>", true), "\x1b[1m hi \x1b[0m");
//!
//! // Plain text for pipes and files
//! assert_eq!(format("<<bold>> hi <<reset>>", false), " hi ");
//!
//! // Keywords combine into one sequence, in written order
//! let formatter = Formatter::new(MarkupMode::Apply);
//! assert_eq!(formatter.format("<<bold red>>!"), "\x1b[1;31m!");
//! ```
//!
//! # Keyword Syntax
//!
//! - Keywords come from a closed table (see [`Style`]); matching ignores case.
//! - Whitespace around and between keywords is free-form and may include
//!   newlines: `<< bold\n  redbg >>` is one span.
//! - A span naming anything outside the table is not a span at all and is
//!   left as literal text. Malformed markup is never an error.

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;

/// Opening delimiter of a markup span.
pub const OPEN: &str = "<<";

/// Closing delimiter of a markup span.
pub const CLOSE: &str = ">>";

/// Markup that restores default terminal attributes.
pub const RESET: &str = "<<reset>>";

const ESC: char = '\x1b';

/// A terminal style keyword and its VT100 control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Reset,
    Bold,
    Dim,
    Ul,
    Underline,
    Blink,
    Reverse,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BlackBg,
    RedBg,
    GreenBg,
    YellowBg,
    BlueBg,
    MagentaBg,
    CyanBg,
    WhiteBg,
}

impl Style {
    /// Every keyword in the table.
    pub const ALL: [Style; 23] = [
        Style::Reset,
        Style::Bold,
        Style::Dim,
        Style::Ul,
        Style::Underline,
        Style::Blink,
        Style::Reverse,
        Style::Black,
        Style::Red,
        Style::Green,
        Style::Yellow,
        Style::Blue,
        Style::Magenta,
        Style::Cyan,
        Style::White,
        Style::BlackBg,
        Style::RedBg,
        Style::GreenBg,
        Style::YellowBg,
        Style::BlueBg,
        Style::MagentaBg,
        Style::CyanBg,
        Style::WhiteBg,
    ];

    /// The lowercase keyword as written inside `<<` `>>`.
    pub fn keyword(self) -> &'static str {
        match self {
            Style::Reset => "reset",
            Style::Bold => "bold",
            Style::Dim => "dim",
            Style::Ul => "ul",
            Style::Underline => "underline",
            Style::Blink => "blink",
            Style::Reverse => "reverse",
            Style::Black => "black",
            Style::Red => "red",
            Style::Green => "green",
            Style::Yellow => "yellow",
            Style::Blue => "blue",
            Style::Magenta => "magenta",
            Style::Cyan => "cyan",
            Style::White => "white",
            Style::BlackBg => "blackbg",
            Style::RedBg => "redbg",
            Style::GreenBg => "greenbg",
            Style::YellowBg => "yellowbg",
            Style::BlueBg => "bluebg",
            Style::MagentaBg => "magentabg",
            Style::CyanBg => "cyanbg",
            Style::WhiteBg => "whitebg",
        }
    }

    /// The numeric SGR control code.
    pub fn code(self) -> u8 {
        match self {
            Style::Reset => 0,
            Style::Bold => 1,
            Style::Dim => 2,
            Style::Ul | Style::Underline => 4,
            Style::Blink => 5,
            Style::Reverse => 7,
            Style::Black => 30,
            Style::Red => 31,
            Style::Green => 32,
            Style::Yellow => 33,
            Style::Blue => 34,
            Style::Magenta => 35,
            Style::Cyan => 36,
            Style::White => 37,
            Style::BlackBg => 40,
            Style::RedBg => 41,
            Style::GreenBg => 42,
            Style::YellowBg => 43,
            Style::BlueBg => 44,
            Style::MagentaBg => 45,
            Style::CyanBg => 46,
            Style::WhiteBg => 47,
        }
    }

    /// Looks up a keyword, ignoring ASCII case.
    pub fn from_keyword(keyword: &str) -> Option<Style> {
        Style::ALL
            .into_iter()
            .find(|style| style.keyword().eq_ignore_ascii_case(keyword))
    }

    /// Returns the keyword that starts `bytes`, preferring the longest one.
    fn match_prefix(bytes: &[u8]) -> Option<Style> {
        BY_LENGTH.iter().copied().find(|style| {
            let keyword = style.keyword().as_bytes();
            bytes.len() >= keyword.len() && bytes[..keyword.len()].eq_ignore_ascii_case(keyword)
        })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Error returned when parsing a [`Style`] from an unknown keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStyle(pub String);

impl fmt::Display for UnknownStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown style keyword: {}", self.0)
    }
}

impl std::error::Error for UnknownStyle {}

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::from_keyword(s).ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

// Longest match is unambiguous for this table: the `bg` suffix that extends a
// color keyword never starts another keyword, so no backtracking is needed.
static BY_LENGTH: Lazy<Vec<Style>> = Lazy::new(|| {
    let mut styles = Style::ALL.to_vec();
    styles.sort_by_key(|style| std::cmp::Reverse(style.keyword().len()));
    styles
});

/// How matched spans are transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupMode {
    /// Replace spans with ANSI escape sequences.
    /// Used for streams that understand VT100 control codes.
    Apply,

    /// Delete spans, leaving the surrounding text untouched.
    /// Used for pipes, files and terminals without escape support.
    Remove,
}

impl MarkupMode {
    /// Picks the mode for a stream's POSIX capability flag.
    pub fn from_posix(posix: bool) -> Self {
        if posix {
            MarkupMode::Apply
        } else {
            MarkupMode::Remove
        }
    }
}

/// Converts `<<keyword>>` markup according to a [`MarkupMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter {
    mode: MarkupMode,
}

impl Formatter {
    /// Creates a formatter with the given mode.
    pub fn new(mode: MarkupMode) -> Self {
        Self { mode }
    }

    /// Creates a formatter for a stream's POSIX capability flag.
    pub fn posix(posix: bool) -> Self {
        Self::new(MarkupMode::from_posix(posix))
    }

    /// Returns the configured mode.
    pub fn mode(&self) -> MarkupMode {
        self.mode
    }

    /// Formats `input`.
    ///
    /// In [`MarkupMode::Remove`] deleting one span can join the text around
    /// it into a new one (`<<<<bold>>bold>>`), which is deleted as well. The
    /// result never contains a span.
    pub fn format(&self, input: &str) -> String {
        match self.mode {
            MarkupMode::Apply => apply_spans(input),
            MarkupMode::Remove => strip_spans(input),
        }
    }
}

fn apply_spans(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for token in Scanner::new(input) {
        match token {
            Token::Text(text) => output.push_str(text),
            Token::Span(styles) => output.push_str(&escape_sequence(&styles)),
        }
    }
    output
}

/// Deletes spans in one pass, rescanning across each join.
///
/// `opens` holds every `<<` still present in the output. A span body may only
/// contain letters and whitespace, so `marks` records the other bytes and a
/// close only needs parsing when no mark sits between it and the last open.
fn strip_spans(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut opens: Vec<usize> = Vec::new();
    let mut marks: Vec<usize> = Vec::new();

    for c in input.chars() {
        let at = output.len();
        output.push(c);
        let bytes = output.as_bytes();
        if !(c.is_ascii_alphabetic() || is_space(bytes[at])) {
            marks.push(at);
        }
        if at == 0 {
            continue;
        }

        match (bytes[at - 1], c) {
            (b'<', '<') => opens.push(at - 1),
            (b'>', '>') => {
                let Some(&open) = opens.last() else { continue };
                let body = open + OPEN.len();
                let clean = marks
                    .iter()
                    .rev()
                    .find(|&&mark| mark < at - 1)
                    .map_or(true, |&mark| mark < body);
                if !clean {
                    continue;
                }
                let spans_to_end = Scanner::parse_span(&bytes[body..])
                    .is_some_and(|(_, consumed)| body + consumed == output.len());
                if spans_to_end {
                    output.truncate(open);
                    while opens.last().is_some_and(|&o| o + OPEN.len() > open) {
                        opens.pop();
                    }
                    while marks.last().is_some_and(|&m| m >= open) {
                        marks.pop();
                    }
                }
            }
            _ => {}
        }
    }
    output
}

/// Formats `text` for a stream whose POSIX capability flag is `posix`.
///
/// Shorthand for `Formatter::posix(posix).format(text)`.
pub fn format(text: &str, posix: bool) -> String {
    Formatter::posix(posix).format(text)
}

/// Builds the escape sequence for a run of styles: `ESC [ c1;c2;... m`.
pub fn escape_sequence(styles: &[Style]) -> String {
    let codes = styles
        .iter()
        .map(|style| style.code().to_string())
        .collect::<Vec<_>>()
        .join(";");
    format!("{ESC}[{codes}m")
}

/// Builds the markup span for a run of styles: `<<k1 k2 ...>>`.
pub fn markup(styles: &[Style]) -> String {
    let keywords = styles
        .iter()
        .map(|style| style.keyword())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{OPEN}{keywords}{CLOSE}")
}

/// Returns true if `input` contains at least one markup span.
pub fn has_markup(input: &str) -> bool {
    Scanner::new(input).any(|token| matches!(token, Token::Span(_)))
}

/// Tokens produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Literal text, including anything that looked like markup but wasn't.
    Text(&'a str),
    /// A recognized span with its styles in written order.
    Span(Vec<Style>),
}

/// Scanner splitting input into literal text and markup spans.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parses the body of a span (everything after `<<`).
    ///
    /// Returns the styles and the number of bytes consumed including `>>`.
    fn parse_span(bytes: &[u8]) -> Option<(Vec<Style>, usize)> {
        let mut styles = Vec::new();
        let mut at = skip_whitespace(bytes, 0);

        loop {
            let style = Style::match_prefix(&bytes[at..])?;
            styles.push(style);
            at = skip_whitespace(bytes, at + style.keyword().len());
            if bytes[at..].starts_with(CLOSE.as_bytes()) {
                return Some((styles, at + CLOSE.len()));
            }
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];
        let mut search = 0;

        while let Some(offset) = remaining[search..].find(OPEN) {
            let open = search + offset;
            let body = remaining[open + OPEN.len()..].as_bytes();
            if let Some((styles, consumed)) = Self::parse_span(body) {
                if open > 0 {
                    // Emit the text first; the span is parsed again on the next call
                    self.pos += open;
                    return Some(Token::Text(&remaining[..open]));
                }
                self.pos += OPEN.len() + consumed;
                return Some(Token::Span(styles));
            }
            // `<<<bold>>` opens at the second `<`, so step one byte at a time
            search = open + 1;
        }

        self.pos = self.input.len();
        Some(Token::Text(remaining))
    }
}

// ASCII whitespace plus vertical tab
fn is_space(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'\x0b'
}

fn skip_whitespace(bytes: &[u8], mut at: usize) -> usize {
    while at < bytes.len() && is_space(bytes[at]) {
        at += 1;
    }
    at
}
