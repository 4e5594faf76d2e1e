//! Label sets and their canonical text form
//!
//! A label set is an ordered collection of unique (name, value) pairs. The
//! insertion order is preserved for rendering, while equality and hashing
//! ignore order. Parsing a rendered label string back is total over renderer
//! output: `render(parse(s)) == s` for any string this module produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single (name, value) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Label name, unique within a set
    pub name: String,
    /// Label value, arbitrary UTF-8 text
    pub value: String,
}

impl Label {
    /// Create a new label
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Errors that can occur when parsing or building a label set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelParseError {
    /// Input ended before the label set was complete
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    /// An unexpected character was found
    #[error("unexpected character {found:?} at byte {pos}")]
    UnexpectedChar { pos: usize, found: char },

    /// A label name occurred more than once
    #[error("duplicate label name: {0}")]
    DuplicateLabel(String),

    /// A label name is empty or contains invalid characters
    #[error("invalid label name: {0:?}")]
    InvalidName(String),
}

/// An immutable, insertion-ordered collection of unique labels
///
/// Equality and hashing are order-insensitive; two sets holding the same
/// pairs in different orders compare equal and hash identically. Rendering
/// is order-sensitive and reproduces the insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    /// Build a label set from (name, value) pairs, preserving order
    pub fn from_pairs<N, V>(
        pairs: impl IntoIterator<Item = (N, V)>,
    ) -> Result<Self, LabelParseError>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set = set.with(name, value)?;
        }
        Ok(set)
    }

    /// Return a new set with one additional label appended
    ///
    /// The receiver is left untouched; callers accumulating labels get an
    /// independent snapshot at every step.
    pub fn with(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, LabelParseError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(LabelParseError::InvalidName(name));
        }
        if self.get(&name).is_some() {
            return Err(LabelParseError::DuplicateLabel(name));
        }

        let mut labels = self.labels.clone();
        labels.push(Label::new(name, value));
        Ok(Self { labels })
    }

    /// Look up a label value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }

    /// Number of labels in the set
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the set has no labels
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over labels in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Render the set in insertion order, e.g. `{region="0", index="1"}`
    pub fn render(&self) -> String {
        render_pairs(self.labels.iter())
    }

    /// Render the set sorted by label name
    ///
    /// This is the stable form fed to the shard hash: two sets holding the
    /// same pairs in different insertion orders canonicalize identically.
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<&Label> = self.labels.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        render_pairs(sorted.into_iter())
    }

    /// Parse a rendered label string back into a set
    ///
    /// Fails with a structured error on malformed input; never panics.
    pub fn parse(input: &str) -> Result<Self, LabelParseError> {
        Parser::new(input).parse()
    }

    fn sorted_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .labels
            .iter()
            .map(|label| (label.name.as_str(), label.value.as_str()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_pairs() == other.sorted_pairs()
    }
}

impl Eq for LabelSet {}

impl std::hash::Hash for LabelSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sorted_pairs().hash(state);
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for LabelSet {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check a label name: `[a-zA-Z_][a-zA-Z0-9_]*`
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render_pairs<'a>(pairs: impl Iterator<Item = &'a Label>) -> String {
    let mut out = String::from("{");
    for (i, label) in pairs.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&label.name);
        out.push_str("=\"");
        for c in label.value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                other => out.push(other),
            }
        }
        out.push('"');
    }
    out.push('}');
    out
}

/// Cursor-based parser for the rendered label form
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<LabelSet, LabelParseError> {
        self.expect('{')?;
        let mut set = LabelSet::new();

        if self.peek() == Some('}') {
            self.bump();
            return self.finish(set);
        }

        loop {
            let name = self.parse_name()?;
            self.expect('=')?;
            let value = self.parse_quoted()?;

            set = set.with(name, value)?;

            match self.peek() {
                Some(',') => {
                    self.bump();
                    if self.peek() == Some(' ') {
                        self.bump();
                    }
                }
                Some('}') => {
                    self.bump();
                    return self.finish(set);
                }
                Some(found) => {
                    return Err(LabelParseError::UnexpectedChar {
                        pos: self.pos,
                        found,
                    })
                }
                None => return Err(LabelParseError::UnexpectedEnd(self.pos)),
            }
        }
    }

    fn finish(self, set: LabelSet) -> Result<LabelSet, LabelParseError> {
        match self.peek() {
            None => Ok(set),
            Some(found) => Err(LabelParseError::UnexpectedChar {
                pos: self.pos,
                found,
            }),
        }
    }

    fn parse_name(&mut self) -> Result<String, LabelParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let name = &self.input[start..self.pos];
        if !is_valid_name(name) {
            return Err(LabelParseError::InvalidName(name.to_string()));
        }
        Ok(name.to_string())
    }

    fn parse_quoted(&mut self) -> Result<String, LabelParseError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    return Ok(value);
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(found) => {
                            return Err(LabelParseError::UnexpectedChar {
                                pos: self.pos,
                                found,
                            })
                        }
                        None => return Err(LabelParseError::UnexpectedEnd(self.pos)),
                    }
                    self.bump();
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
                None => return Err(LabelParseError::UnexpectedEnd(self.pos)),
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LabelParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(LabelParseError::UnexpectedChar {
                pos: self.pos,
                found,
            }),
            None => Err(LabelParseError::UnexpectedEnd(self.pos)),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }
}
