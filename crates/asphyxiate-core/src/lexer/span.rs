//! Source location tracking for scanned header files

#![allow(clippy::cast_possible_truncation)] // Spans are u32; inputs > 4GB are unsupported

use std::ops::Range;

use serde::Serialize;

/// Index of an input file within one batch, in input order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Position of the file in the input batch
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A byte range in a source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Span {
    /// Byte offset of the start of the span
    pub start: u32,
    /// Byte offset of the end of the span (exclusive)
    pub end: u32,
}

impl Span {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn from_range(range: Range<usize>) -> Self {
        Self {
            start: range.start as u32,
            end: range.end as u32,
        }
    }

    /// Length of the span in bytes
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Create a span that encompasses both self and other
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }

    /// Shift the span right by `offset` bytes
    #[must_use]
    pub const fn offset(self, offset: u32) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    #[must_use]
    pub const fn as_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::from_range(range)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Line and column of a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// 1-indexed line number
    pub line: u32,
    /// 1-indexed column number (in bytes)
    pub column: u32,
}

impl Location {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A fully qualified position: file, byte span and the line/column of its start.
///
/// Ordering is by file, then byte offset, which is the (file, line) order
/// declarations are kept in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceLocation {
    pub file: FileId,
    pub span: Span,
    pub location: Location,
}

impl SourceLocation {
    #[must_use]
    pub const fn new(file: FileId, span: Span, location: Location) -> Self {
        Self {
            file,
            span,
            location,
        }
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.location.line
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.location)
    }
}

/// Maps byte offsets to line/column locations
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets where each line starts
    line_starts: Vec<u32>,
}

impl LineIndex {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a line/column location
    #[must_use]
    pub fn location(&self, offset: u32) -> Location {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        Location {
            line: (line + 1) as u32,
            column: offset - line_start + 1,
        }
    }

    /// Get the number of lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_and_offset() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
        assert_eq!(merged.offset(10), Span::new(15, 25));
        assert_eq!(merged.len(), 10);
    }

    #[test]
    fn line_index_multiple_lines() {
        let index = LineIndex::new("line1\nline2\nline3");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.location(0), Location::new(1, 1));
        assert_eq!(index.location(5), Location::new(1, 6));
        assert_eq!(index.location(6), Location::new(2, 1));
        assert_eq!(index.location(12), Location::new(3, 1));
    }

    #[test]
    fn source_locations_order_by_file_then_offset() {
        let a = SourceLocation::new(FileId(0), Span::new(90, 95), Location::new(9, 1));
        let b = SourceLocation::new(FileId(1), Span::new(3, 8), Location::new(1, 4));
        let c = SourceLocation::new(FileId(1), Span::new(40, 48), Location::new(4, 1));
        let mut locations = vec![c, b, a];
        locations.sort();
        assert_eq!(locations, vec![a, b, c]);
    }
}
