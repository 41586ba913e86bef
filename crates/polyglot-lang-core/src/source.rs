//! The source buffer owns one analysis request's input text.
//!
//! Newlines are normalized to LF on construction so that every
//! downstream stage sees the same byte offsets. The buffer maps byte
//! offsets back to (line, column) for diagnostics.

use crate::span::Span;

/// Owns the input text of one analysis request.
///
/// All tokens and AST spans produced from this buffer reference its
/// normalized text; they must not outlive it.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    text: String,
    /// Byte offset of the start of each line (line_starts[0] == 0).
    line_starts: Vec<u32>,
}

impl SourceBuffer {
    /// Create a buffer from raw input, normalizing CRLF and lone CR to LF.
    pub fn new(input: &str) -> Self {
        let text = normalize_newlines(input);
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { text, line_starts }
    }

    /// The normalized text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the normalized text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of lines (a trailing newline does not open a new line).
    pub fn line_count(&self) -> usize {
        if self.text.ends_with('\n') {
            self.line_starts.len() - 1
        } else {
            self.line_starts.len()
        }
    }

    /// Map a byte offset to 1-based (line, column).
    ///
    /// Offsets past the end of the buffer report the position just
    /// after the last byte.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.text.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line_idx] + 1;
        (line_idx as u32 + 1, col)
    }

    /// Slice the text covered by a span.
    pub fn slice(&self, span: Span) -> &str {
        let start = span.offset as usize;
        let end = (span.end() as usize).min(self.text.len());
        &self.text[start.min(end)..end]
    }

    /// The full text of the 1-based line, without its newline.
    pub fn line_text(&self, line: u32) -> &str {
        let idx = (line.saturating_sub(1)) as usize;
        if idx >= self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[idx] as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.text.len(), |&s| s as usize - 1);
        &self.text[start..end]
    }
}

fn normalize_newlines(input: &str) -> String {
    if !input.contains('\r') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_crlf() {
        let buf = SourceBuffer::new("a\r\nb\rc\n");
        assert_eq!(buf.text(), "a\nb\nc\n");
    }

    #[test]
    fn test_line_col() {
        let buf = SourceBuffer::new("ab\ncd\nef");
        assert_eq!(buf.line_col(0), (1, 1));
        assert_eq!(buf.line_col(1), (1, 2));
        assert_eq!(buf.line_col(3), (2, 1));
        assert_eq!(buf.line_col(7), (3, 2));
    }

    #[test]
    fn test_line_col_past_end() {
        let buf = SourceBuffer::new("ab");
        assert_eq!(buf.line_col(99), (1, 3));
    }

    #[test]
    fn test_slice() {
        let buf = SourceBuffer::new("hello world");
        let span = Span::new(1, 7, 6, 5);
        assert_eq!(buf.slice(span), "world");
    }

    #[test]
    fn test_line_text() {
        let buf = SourceBuffer::new("one\ntwo\nthree");
        assert_eq!(buf.line_text(1), "one");
        assert_eq!(buf.line_text(2), "two");
        assert_eq!(buf.line_text(3), "three");
        assert_eq!(buf.line_text(9), "");
    }

    #[test]
    fn test_line_count() {
        assert_eq!(SourceBuffer::new("a\nb\n").line_count(), 2);
        assert_eq!(SourceBuffer::new("a\nb").line_count(), 2);
        assert_eq!(SourceBuffer::new("").line_count(), 1);
    }
}
