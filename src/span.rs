//! Byte-offset spans into imported list files
use std::ops::Range;

/// Represents a span in an imported file (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Locate a 1-based line and byte column (as reported by `serde_json`)
    /// and return a one-character span there, clamped to the source length.
    pub fn at_line_column(source: &str, line: usize, column: usize) -> Self {
        let mut offset = source.len();
        let mut line_start = 0;
        for (index, text) in source.split_inclusive('\n').enumerate() {
            if index + 1 == line {
                offset = line_start + column.saturating_sub(1).min(text.len());
                break;
            }
            line_start += text.len();
        }

        let mut start = offset.min(source.len());
        while !source.is_char_boundary(start) {
            start -= 1;
        }
        let end = source[start..]
            .chars()
            .next()
            .map(|c| start + c.len_utf8())
            .unwrap_or(start);
        Span { start, end }
    }

    /// Convert to a Range for use with ariadne
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Get the length of the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{parse_import, ImportError};

    #[test]
    fn test_at_line_column() {
        let source = "{\n  \"a\": 1\n}";
        let span = Span::at_line_column(source, 2, 3);
        assert_eq!(&source[span.range()], "\"");
        assert_eq!(span.len(), 1);
    }

    #[test]
    fn test_at_line_column_counts_bytes() {
        let source = r#"{"Zoë Ångström": ["a",, "b"]}"#;
        let Err(ImportError::Syntax { span, .. }) = parse_import(source) else {
            panic!("expected a syntax error");
        };
        assert_eq!(span.start, source.find(",,").unwrap() + 1);
        assert_eq!(&source[span.range()], ",");
    }

    #[test]
    fn test_at_line_column_snaps_to_char_boundary() {
        let source = "\"ë\"";
        let span = Span::at_line_column(source, 1, 3);
        assert_eq!(span.start, 1);
        assert_eq!(&source[span.range()], "ë");
    }

    #[test]
    fn test_at_line_column_past_end() {
        let source = "{";
        let span = Span::at_line_column(source, 4, 10);
        assert_eq!(span.start, 1);
        assert!(span.is_empty());
    }
}
