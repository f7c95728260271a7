//! Text positions and ranges.
//!
//! Positions are zero-based `(line, character)` pairs. The `character` field
//! counts either UTF-8 or UTF-16 code units depending on the invocation's
//! [`crate::compiler::CompilerConfig::count_utf16_characters`] flag, so that
//! downstream language-server layers can hand ranges to LSP clients without
//! re-measuring lines.

use serde::Serialize;

/// A zero-based position inside a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize)]
pub struct TextPosition {
    pub line: u32,
    pub character: u32,
}

impl TextPosition {
    pub fn new(line: u32, character: u32) -> Self {
        TextPosition { line, character }
    }
}

impl std::fmt::Display for TextPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// A half-open range `[start, end)` over text positions.
///
/// Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        debug_assert!(start <= end, "range start must not be after end");
        TextRange { start, end }
    }

    /// An empty range anchored at one position.
    pub fn point(pos: TextPosition) -> Self {
        TextRange { start: pos, end: pos }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, pos: TextPosition) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl std::fmt::Display for TextRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}~{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_range_is_empty() {
        let range = TextRange::point(TextPosition::new(3, 7));
        assert!(range.is_empty());
        assert!(!range.contains(TextPosition::new(3, 7)));
    }

    #[test]
    fn contains_is_half_open() {
        let range = TextRange::new(TextPosition::new(0, 2), TextPosition::new(0, 5));
        assert!(range.contains(TextPosition::new(0, 2)));
        assert!(range.contains(TextPosition::new(0, 4)));
        assert!(!range.contains(TextPosition::new(0, 5)));
    }

    #[test]
    fn position_ordering_is_line_major() {
        assert!(TextPosition::new(1, 0) > TextPosition::new(0, 99));
        assert!(TextPosition::new(2, 3) < TextPosition::new(2, 4));
    }
}
