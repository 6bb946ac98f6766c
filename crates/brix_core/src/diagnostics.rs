//! Non-fatal build conditions.
//!
//! None of these abort a build. Each one is logged as a warning when it is
//! recorded and kept so the caller can report or count them afterwards.

use std::fmt;

use crate::line::LineError;

#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// A reference exhausted every search root; placeholder geometry was used
    MissingPart { reference: String, parent: String },

    /// A color token had no table entry; the error color was used
    MissingColor { token: String, source: String },

    /// A geometry line could not be decoded and was skipped
    MalformedLine {
        source: String,
        line: usize,
        error: LineError,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingPart { reference, parent } if parent.is_empty() => {
                write!(f, "part '{}' not found", reference)
            }
            Diagnostic::MissingPart { reference, parent } => {
                write!(f, "part '{}' referenced by '{}' not found", reference, parent)
            }
            Diagnostic::MissingColor { token, source } => {
                write!(f, "color '{}' in '{}' not in color table", token, source)
            }
            Diagnostic::MalformedLine {
                source,
                line,
                error,
            } => write!(f, "{}:{}: {}", source, line, error),
        }
    }
}

/// Collected diagnostics, in the order they occurred.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    /// Take over diagnostics recorded elsewhere (already logged there).
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn missing_parts(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::MissingPart { .. }))
    }

    pub fn missing_colors(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::MissingColor { .. }))
    }

    pub fn malformed_lines(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::MalformedLine { .. }))
    }

    fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.items.iter().filter(|d| predicate(d)).count()
    }
}
