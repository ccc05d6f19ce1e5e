//! Source locations attached to nodes and errors.

use std::fmt;

/// Position of a node in the script that produced it.
///
/// The parser is external, so spans are whatever the host attached to the
/// nodes it built. A default span (`0:0`) means "location unknown".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed, 0 when unknown).
    pub line: u32,
    /// Column number (1-indexed, 0 when unknown).
    pub col: u32,
    /// Length of the covered text in bytes.
    pub len: u32,
}

impl Span {
    /// Create a span from a line, column and length.
    #[inline]
    pub const fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub const fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether the location of this span is known.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.line != 0
    }

    /// Pick the first known span of the two.
    #[inline]
    pub fn or(self, other: Span) -> Span {
        if self.is_known() { self } else { other }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
