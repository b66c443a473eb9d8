//! Source span and location tracking.
//!
//! Every AST node and every diagnostic carries a [`Span`]. Spans are byte
//! offsets into one source file plus a cached line/column for the start, and
//! a [`FileId`] so diagnostics from different modules can be told apart.

use serde::{Deserialize, Serialize};

/// Index of a source file registered with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// A precomputed index of line start positions for O(log n) line/column lookup.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets where each line starts. line_starts[0] = 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a line index from source code.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    /// Look up the 1-indexed line and column for a byte offset.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx] + 1) as u32;
        (line, col)
    }
}

/// A contiguous region of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// The file this span points into.
    pub file: FileId,
    /// Byte offset of the start (inclusive).
    pub start: usize,
    /// Byte offset of the end (exclusive).
    pub end: usize,
    /// 1-indexed line number of the start.
    pub start_line: u32,
    /// 1-indexed column number of the start.
    pub start_col: u32,
}

impl Span {
    /// Create a new span in the default file.
    pub fn new(start: usize, end: usize, start_line: u32, start_col: u32) -> Self {
        Self {
            file: FileId::default(),
            start,
            end,
            start_line,
            start_col,
        }
    }

    /// Create a dummy span for synthesized code (builtins, host bindings).
    pub fn dummy() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Return the same span attributed to `file`.
    pub fn in_file(mut self, file: FileId) -> Self {
        self.file = file;
        self
    }

    /// Whether this span was synthesized rather than read from source.
    pub fn is_dummy(&self) -> bool {
        self.start_line == 0
    }

    /// The length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans of the same file into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        let start = self.start.min(other.start);
        let end = self.end.max(other.end);
        let (start_line, start_col) = if self.start <= other.start {
            (self.start_line, self.start_col)
        } else {
            (other.start_line, other.start_col)
        };
        Span {
            file: self.file,
            start,
            end,
            start_line,
            start_col,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_lookup() {
        let index = LineIndex::new("func f()\n{\n  return 1;\n}\n");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(9), (2, 1));
        assert_eq!(index.line_col(13), (3, 3));
    }

    #[test]
    fn test_merge_keeps_earliest_position() {
        let a = Span::new(10, 12, 2, 3);
        let b = Span::new(4, 6, 1, 5);
        let merged = a.merge(b);
        assert_eq!((merged.start, merged.end), (4, 12));
        assert_eq!((merged.start_line, merged.start_col), (1, 5));
    }
}
