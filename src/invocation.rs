//! Gallery tag markup parsing.
//!
//! The markup is everything between the tag name and the closing `%}`:
//!
//! ```text
//! {% gallery "christmas market" %}
//! {% gallery "christmas market" ["Mulled wine", 'Carousel'] %}
//!            ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ markup
//! ```
//!
//! The grammar is a double-quoted photoset title followed by an optional
//! bracketed list of photo titles. The title is searched for anywhere in the
//! markup (not anchored), so leading noise is tolerated.
//!
//! ## Photo lists
//!
//! The bracketed list uses string-literal syntax with either quote style:
//! `["a", 'b', "c",]`. It is parsed by a small hand-written reader that only
//! understands strings, commas and whitespace. Nothing in the markup is ever
//! evaluated.

use regex::Regex;
use thiserror::Error;

/// Usage string echoed back in every parse error.
pub const SYNTAX: &str = r#"{% gallery "photoset_title" %}"#;

const MARKUP_PATTERN: &str = r#""(?P<title>[^"]+)"\s*(?P<photos>\[(?s:.+)\])?"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Error processing input. Expected syntax: {syntax}", syntax = SYNTAX)]
    Syntax,
    #[error("invalid photo list at offset {offset}: {reason}. Expected syntax: {syntax}", syntax = SYNTAX)]
    PhotoList { offset: usize, reason: &'static str },
    #[error("invalid photoset title pattern {pattern:?}: {reason}. Expected syntax: {syntax}", syntax = SYNTAX)]
    Pattern { pattern: String, reason: String },
}

/// A parsed gallery tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Photoset title pattern (a case-insensitive regular expression).
    pub title: String,
    /// Photo titles to keep, in the order written. `None` keeps every photo.
    pub photos: Option<Vec<String>>,
}

/// Compiled markup grammar. Built once and reused for every tag occurrence.
#[derive(Debug, Clone)]
pub struct Grammar {
    markup: Regex,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        Self {
            markup: Regex::new(MARKUP_PATTERN).expect("markup pattern must compile"),
        }
    }

    /// Parse tag markup into an [`Invocation`].
    pub fn parse(&self, markup: &str) -> Result<Invocation, ParseError> {
        let caps = self.markup.captures(markup).ok_or(ParseError::Syntax)?;
        let title = caps["title"].to_string();
        let photos = match caps.name("photos") {
            Some(list) => Some(parse_string_list(list.as_str())?),
            None => None,
        };
        Ok(Invocation { title, photos })
    }
}

/// Parse a bracketed list of string literals: `["a", 'b']`.
///
/// Supports both quote styles, backslash escapes (`\\`, `\"`, `\'`, `\n`,
/// `\t`), arbitrary whitespace and a trailing comma. Offsets in errors are
/// byte positions within `input`.
pub fn parse_string_list(input: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = ListReader {
        chars: input.char_indices().peekable(),
        len: input.len(),
    };
    reader.expect('[')?;

    let mut items = Vec::new();
    loop {
        reader.skip_whitespace();
        match reader.peek() {
            Some(']') => {
                reader.bump();
                break;
            }
            Some('"') | Some('\'') => items.push(reader.string()?),
            Some(_) => return Err(reader.error("expected a quoted string")),
            None => return Err(reader.error("unterminated list")),
        }
        reader.skip_whitespace();
        match reader.peek() {
            Some(',') => {
                reader.bump();
            }
            Some(']') => {
                reader.bump();
                break;
            }
            Some(_) => return Err(reader.error("expected ',' or ']'")),
            None => return Err(reader.error("unterminated list")),
        }
    }

    reader.skip_whitespace();
    if reader.peek().is_some() {
        return Err(reader.error("unexpected text after list"));
    }
    Ok(items)
}

struct ListReader<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    len: usize,
}

impl ListReader<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.len)
    }

    fn error(&mut self, reason: &'static str) -> ParseError {
        ParseError::PhotoList {
            offset: self.offset(),
            reason,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error("expected '['")),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("expected a quoted string"));
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    Some(_) => return Err(self.error("unsupported escape")),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }
}
