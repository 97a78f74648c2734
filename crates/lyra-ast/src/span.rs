//! Source spans
//!
//! A span covers a contiguous region of one source file: 1-based lines,
//! 0-based columns. The lowering engine attaches a span to every
//! synthesized IR operand so diagnostics can map IR back to source.

use serde::{Deserialize, Serialize};

/// A source region: 1-based lines, 0-based columns, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    /// The span used for nodes with no known source location.
    pub const UNKNOWN: Span = Span {
        start_line: 0,
        start_col: 0,
        end_line: 0,
        end_col: 0,
    };

    /// Create a new span.
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A single-line span.
    pub fn on_line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self::new(line, start_col, line, end_col)
    }

    /// Check whether this span carries a real location.
    pub fn is_unknown(&self) -> bool {
        self.start_line == 0
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        if self.is_unknown() {
            return *other;
        }
        if other.is_unknown() {
            return *self;
        }
        let (start_line, start_col) =
            if (self.start_line, self.start_col) <= (other.start_line, other.start_col) {
                (self.start_line, self.start_col)
            } else {
                (other.start_line, other.start_col)
            };
        let (end_line, end_col) = if (self.end_line, self.end_col) >= (other.end_line, other.end_col)
        {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span::new(start_line, start_col, end_line, end_col)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start_line, self.start_col, self.end_line, self.end_col
            )
        }
    }
}
