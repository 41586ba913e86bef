//! Python lexer — tokenizes source with significant indentation.
//!
//! Key rules:
//! - `Indent` is emitted when a line's leading-whitespace column count
//!   exceeds the indentation stack top; one `Dedent` per stack entry
//!   popped back down. One tab counts as four spaces.
//! - Blank and comment-only lines never touch the stack.
//! - At EOF the stack unwinds to column zero with synthetic `Dedent`s.
//! - `Newline` ends every logical line and is a real token.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{Token, TokenKind};

const TAB_WIDTH: u32 = 4;

/// Tokenize Python source. Always ends in exactly one `Eof` token;
/// lexical trouble becomes `Error` tokens plus diagnostics.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(u32, char)>,
    pos: usize,
    line: u32,
    col: u32,
    indents: Vec<u32>,
    tokens: Vec<Token>,
    diags: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().map(|(i, c)| (i as u32, c)).collect(),
            pos: 0,
            line: 1,
            col: 1,
            indents: vec![0],
            tokens: Vec::new(),
            diags: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while self.pos < self.chars.len() {
            self.handle_line_start();
            if self.pos >= self.chars.len() {
                break;
            }
            self.lex_line_body();
        }

        // Terminate a dangling logical line, then unwind indentation.
        if matches!(
            self.tokens.last().map(|t| &t.kind),
            Some(k) if !matches!(k, TokenKind::Newline)
        ) {
            self.push_synthetic(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_synthetic(TokenKind::Dedent);
        }
        self.push_synthetic(TokenKind::Eof);
        (self.tokens, self.diags)
    }

    // -- cursor helpers --------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn offset(&self) -> u32 {
        self.chars
            .get(self.pos)
            .map_or(self.src.len() as u32, |&(i, _)| i)
    }

    fn advance(&mut self) {
        if let Some(&(_, c)) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn span_from(&self, line: u32, col: u32, start: u32) -> Span {
        Span::new(line, col, start, self.offset() - start)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        let lexeme = self.src[span.offset as usize..span.end() as usize].to_string();
        self.tokens.push(Token { kind, lexeme, span });
    }

    fn push_synthetic(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            lexeme: String::new(),
            span: Span::point(self.line, self.col, self.offset()),
        });
    }

    // -- line layout -----------------------------------------------------

    /// Measure leading whitespace and emit Indent/Dedent as needed.
    /// Blank and comment-only lines are consumed whole.
    fn handle_line_start(&mut self) {
        loop {
            let mut width = 0u32;
            let mut probe = self.pos;
            while let Some(&(_, c)) = self.chars.get(probe) {
                match c {
                    ' ' => width += 1,
                    '\t' => width += TAB_WIDTH,
                    _ => break,
                }
                probe += 1;
            }
            match self.chars.get(probe).map(|&(_, c)| c) {
                // Blank line: swallow it, stack untouched.
                Some('\n') => {
                    while self.pos <= probe {
                        self.advance();
                    }
                    continue;
                }
                // Comment-only line: swallow through the newline.
                Some('#') => {
                    while self.pos < self.chars.len() && self.peek() != Some('\n') {
                        self.advance();
                    }
                    self.advance();
                    continue;
                }
                None => {
                    // Trailing whitespace before EOF.
                    while self.pos < probe {
                        self.advance();
                    }
                    return;
                }
                Some(_) => {
                    while self.pos < probe {
                        self.advance();
                    }
                    self.apply_indent(width);
                    return;
                }
            }
        }
    }

    fn apply_indent(&mut self, width: u32) {
        let top = *self.indents.last().expect("indent stack is never empty");
        if width > top {
            self.indents.push(width);
            self.push_synthetic(TokenKind::Indent);
        } else if width < top {
            while *self.indents.last().unwrap() > width {
                self.indents.pop();
                self.push_synthetic(TokenKind::Dedent);
            }
            if *self.indents.last().unwrap() != width {
                self.diags.push(Diagnostic::error(
                    Stage::Lex,
                    DiagKind::IndentationInconsistent,
                    format!("unindent to column {width} does not match any outer level"),
                    Span::point(self.line, self.col, self.offset()),
                ));
                self.indents.push(width);
            }
        }
    }

    // -- token scanning --------------------------------------------------

    fn lex_line_body(&mut self) {
        while let Some(c) = self.peek() {
            let (line, col, start) = (self.line, self.col, self.offset());
            match c {
                '\n' => {
                    self.advance();
                    self.push(TokenKind::Newline, Span::new(line, col, start, 1));
                    return;
                }
                ' ' | '\t' => {
                    self.advance();
                }
                '#' => {
                    while self.pos < self.chars.len() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                '\'' | '"' => self.lex_string(c),
                _ if c.is_ascii_digit() => self.lex_number(),
                _ if c.is_alphabetic() || c == '_' => self.lex_word(),
                _ => {
                    if let Some(kind) = self.lex_operator() {
                        let span = self.span_from(line, col, start);
                        self.push(kind, span);
                    } else {
                        self.advance();
                        let span = self.span_from(line, col, start);
                        let message = format!("unrecognized character: '{c}'");
                        self.diags.push(Diagnostic::error(
                            Stage::Lex,
                            DiagKind::UnrecognizedCharacter,
                            message.clone(),
                            span,
                        ));
                        self.push(TokenKind::Error(message), span);
                    }
                }
            }
        }
    }

    fn lex_operator(&mut self) -> Option<TokenKind> {
        let c = self.peek()?;
        let two = self.peek_at(1);
        let kind = match (c, two) {
            ('*', Some('*')) => { self.advance(); self.advance(); TokenKind::StarStar }
            ('*', Some('=')) => { self.advance(); self.advance(); TokenKind::StarEq }
            ('/', Some('/')) => { self.advance(); self.advance(); TokenKind::SlashSlash }
            ('/', Some('=')) => { self.advance(); self.advance(); TokenKind::SlashEq }
            ('+', Some('=')) => { self.advance(); self.advance(); TokenKind::PlusEq }
            ('-', Some('=')) => { self.advance(); self.advance(); TokenKind::MinusEq }
            ('<', Some('=')) => { self.advance(); self.advance(); TokenKind::Le }
            ('<', Some('<')) => { self.advance(); self.advance(); TokenKind::Shl }
            ('>', Some('=')) => { self.advance(); self.advance(); TokenKind::Ge }
            ('>', Some('>')) => { self.advance(); self.advance(); TokenKind::Shr }
            ('=', Some('=')) => { self.advance(); self.advance(); TokenKind::EqEq }
            ('!', Some('=')) => { self.advance(); self.advance(); TokenKind::NotEq }
            ('+', _) => { self.advance(); TokenKind::Plus }
            ('-', _) => { self.advance(); TokenKind::Minus }
            ('*', _) => { self.advance(); TokenKind::Star }
            ('/', _) => { self.advance(); TokenKind::Slash }
            ('%', _) => { self.advance(); TokenKind::Percent }
            ('<', _) => { self.advance(); TokenKind::Lt }
            ('>', _) => { self.advance(); TokenKind::Gt }
            ('=', _) => { self.advance(); TokenKind::Assign }
            ('&', _) => { self.advance(); TokenKind::Amp }
            ('|', _) => { self.advance(); TokenKind::Pipe }
            ('^', _) => { self.advance(); TokenKind::Caret }
            ('(', _) => { self.advance(); TokenKind::LParen }
            (')', _) => { self.advance(); TokenKind::RParen }
            ('[', _) => { self.advance(); TokenKind::LBracket }
            (']', _) => { self.advance(); TokenKind::RBracket }
            ('{', _) => { self.advance(); TokenKind::LBrace }
            ('}', _) => { self.advance(); TokenKind::RBrace }
            (',', _) => { self.advance(); TokenKind::Comma }
            (':', _) => { self.advance(); TokenKind::Colon }
            ('.', _) => { self.advance(); TokenKind::Dot }
            _ => return None,
        };
        Some(kind)
    }

    fn lex_word(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let span = self.span_from(line, col, start);
        let word = &self.src[span.offset as usize..span.end() as usize];
        let kind = TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
        self.push(kind, span);
    }

    fn lex_number(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }
        let span = self.span_from(line, col, start);
        let text = &self.src[span.offset as usize..span.end() as usize];
        let kind = if is_float {
            match text.parse::<f64>() {
                Ok(x) => TokenKind::Float(x),
                Err(_) => self.bad_number(text, span),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => self.bad_number(text, span),
            }
        };
        self.push(kind, span);
    }

    fn bad_number(&mut self, text: &str, span: Span) -> TokenKind {
        let message = format!("invalid number literal '{text}'");
        self.diags.push(Diagnostic::error(
            Stage::Lex,
            DiagKind::InvalidNumberLiteral,
            message.clone(),
            span,
        ));
        TokenKind::Error(message)
    }

    fn lex_string(&mut self, quote: char) {
        let (line, col, start) = (self.line, self.col, self.offset());
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    let span = self.span_from(line, col, start);
                    self.push(TokenKind::Str(value), span);
                    return;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('"') => value.push('"'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => break,
                    }
                    self.advance();
                }
                Some('\n') | None => break,
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        let span = self.span_from(line, col, start);
        let message = "string literal is not terminated".to_string();
        self.diags.push(Diagnostic::error(
            Stage::Lex,
            DiagKind::UnterminatedString,
            message.clone(),
            span,
        ));
        self.push(TokenKind::Error(message), span);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_indent_dedent_pairing() {
        let kinds = kinds("if x:\n    y = 1\nz = 2\n");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn test_dedent_unwinds_at_eof() {
        let kinds = kinds("if x:\n    if y:\n        z = 1\n");
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_blank_and_comment_lines_ignore_stack() {
        let src = "def f():\n    a = 1\n\n    # comment\n    b = 2\n";
        let kinds = kinds(src);
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        assert_eq!(indents, 1, "blank/comment lines must not dedent");
    }

    #[test]
    fn test_tab_counts_as_four() {
        let kinds_tab = kinds("if x:\n\ty = 1\n");
        assert!(kinds_tab.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_inconsistent_dedent_flagged() {
        let (_, diags) = lex("if x:\n        a = 1\n    b = 2\n");
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::IndentationInconsistent));
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let kinds = kinds("def foo(): pass\n");
        assert_eq!(kinds[0], TokenKind::Def);
        assert_eq!(kinds[1], TokenKind::Ident("foo".into()));
        assert!(kinds.contains(&TokenKind::Pass));
    }

    #[test]
    fn test_string_escapes_decoded() {
        let (tokens, diags) = lex("s = 'a\\nb'\n");
        assert!(diags.is_empty());
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Str("a\nb".into())));
        // The lexeme keeps the raw source form.
        let tok = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Str(_)))
            .unwrap();
        assert_eq!(tok.lexeme, "'a\\nb'");
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, diags) = lex("s = 'oops\n");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Error(_))));
    }

    #[test]
    fn test_unrecognized_character_continues() {
        let (tokens, diags) = lex("a = 1 ` + 2\n");
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::UnrecognizedCharacter));
        // Lexing continued past the error token.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Int(2)));
    }

    #[test]
    fn test_numbers() {
        let kinds = kinds("x = 42 + 3.5\n");
        assert!(kinds.contains(&TokenKind::Int(42)));
        assert!(kinds.contains(&TokenKind::Float(3.5)));
    }

    #[test]
    fn test_ends_with_single_eof() {
        let (tokens, _) = lex("x = 1");
        let eofs = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Eof)
            .count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_augmented_operators() {
        let kinds = kinds("t += 1\nu //= 2\n");
        assert!(kinds.contains(&TokenKind::PlusEq));
        // `//=` lexes as `//` then `=` in this subset.
        assert!(kinds.contains(&TokenKind::SlashSlash));
    }

    #[test]
    fn test_spans_do_not_overlap() {
        let (tokens, _) = lex("def add(a,b):\n    return a+b\n");
        for pair in tokens.windows(2) {
            assert!(
                pair[0].span.disjoint(&pair[1].span)
                    || pair[0].span.is_empty()
                    || pair[1].span.is_empty()
            );
        }
    }
}
