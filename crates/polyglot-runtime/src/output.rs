//! Captured standard output.
//!
//! Output is an ordered list of newline-terminated chunks (stored
//! without the terminator). Languages with an unterminated `write`
//! (Pascal, C++ `<<` without `endl`) accumulate into a pending buffer
//! that is flushed as a final chunk at end of run.

/// Ordered stdout capture for one interpreter run.
#[derive(Debug, Default)]
pub struct Output {
    chunks: Vec<String>,
    pending: String,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text without terminating the current chunk.
    pub fn write(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Terminate the current chunk (emits even if empty).
    pub fn end_line(&mut self) {
        self.chunks.push(std::mem::take(&mut self.pending));
    }

    /// Append one full newline-terminated chunk.
    pub fn line(&mut self, text: impl Into<String>) {
        if self.pending.is_empty() {
            self.chunks.push(text.into());
        } else {
            self.pending.push_str(&text.into());
            self.end_line();
        }
    }

    /// Flush any pending partial line and return the chunks.
    pub fn finish(mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            self.chunks.push(std::mem::take(&mut self.pending));
        }
        self.chunks
    }

    /// Chunks emitted so far (pending text not included).
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_end_line() {
        let mut out = Output::new();
        out.write("x=");
        out.write("7");
        out.end_line();
        assert_eq!(out.finish(), vec!["x=7".to_string()]);
    }

    #[test]
    fn test_line_merges_pending() {
        let mut out = Output::new();
        out.write("a");
        out.line("b");
        out.line("c");
        assert_eq!(out.finish(), vec!["ab".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_finish_flushes_partial() {
        let mut out = Output::new();
        out.line("done");
        out.write("partial");
        assert_eq!(out.finish(), vec!["done".to_string(), "partial".to_string()]);
    }
}
