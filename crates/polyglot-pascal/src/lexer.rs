//! Pascal lexer.
//!
//! Key rules:
//! - Keywords and identifiers are case-insensitive; identifiers fold
//!   to lowercase, lexemes keep the written form.
//! - Comments are `{ ... }` and `(* ... *)`, not nested.
//! - Strings are single-quoted; a doubled `''` is an apostrophe.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{Token, TokenKind};

/// Tokenize Pascal source.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(u32, char)>,
    pos: usize,
    line: u32,
    col: u32,
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
            tokens: Vec::new(),
            diags: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while let Some(c) = self.peek() {
            let (line, col, start) = (self.line, self.col, self.offset());
            match c {
                ' ' | '\t' | '\n' | '\r' => self.advance(),
                '{' => self.skip_brace_comment(line, col, start),
                '(' if self.peek_at(1) == Some('*') => self.skip_paren_comment(line, col, start),
                '\'' => self.lex_string(),
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
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            span: Span::point(self.line, self.col, self.offset()),
        });
        (self.tokens, self.diags)
    }

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

    fn skip_brace_comment(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // {
        let mut closed = false;
        while let Some(c) = self.peek() {
            self.advance();
            if c == '}' {
                closed = true;
                break;
            }
        }
        if !closed {
            self.diags.push(Diagnostic::error(
                Stage::Lex,
                DiagKind::UnterminatedComment,
                "comment is not terminated",
                self.span_from(line, col, start),
            ));
        }
    }

    fn skip_paren_comment(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // (
        self.advance(); // *
        let mut closed = false;
        while let Some(c) = self.peek() {
            if c == '*' && self.peek_at(1) == Some(')') {
                self.advance();
                self.advance();
                closed = true;
                break;
            }
            self.advance();
        }
        if !closed {
            self.diags.push(Diagnostic::error(
                Stage::Lex,
                DiagKind::UnterminatedComment,
                "comment is not terminated",
                self.span_from(line, col, start),
            ));
        }
    }

    fn lex_string(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    // '' inside a string is an escaped apostrophe.
                    if self.peek() == Some('\'') {
                        value.push('\'');
                        self.advance();
                    } else {
                        let span = self.span_from(line, col, start);
                        self.push(TokenKind::Str(value), span);
                        return;
                    }
                }
                Some('\n') | None => {
                    let span = self.span_from(line, col, start);
                    let message = "string literal is not terminated".to_string();
                    self.diags.push(Diagnostic::error(
                        Stage::Lex,
                        DiagKind::UnterminatedString,
                        message.clone(),
                        span,
                    ));
                    self.push(TokenKind::Error(message), span);
                    return;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn lex_number(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        let mut is_real = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_real && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                is_real = true;
                self.advance();
            } else {
                break;
            }
        }
        let span = self.span_from(line, col, start);
        let text = &self.src[span.offset as usize..span.end() as usize];
        let kind = if is_real {
            match text.parse::<f64>() {
                Ok(x) => TokenKind::Real(x),
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
        let kind = TokenKind::keyword(word)
            .unwrap_or_else(|| TokenKind::Ident(word.to_ascii_lowercase()));
        self.push(kind, span);
    }

    fn lex_operator(&mut self) -> Option<TokenKind> {
        let c = self.peek()?;
        let c2 = self.peek_at(1);
        let mut take = |n: usize, kind: TokenKind| {
            for _ in 0..n {
                self.advance();
            }
            Some(kind)
        };
        match (c, c2) {
            (':', Some('=')) => take(2, TokenKind::Assign),
            (':', _) => take(1, TokenKind::Colon),
            ('<', Some('>')) => take(2, TokenKind::NotEq),
            ('<', Some('=')) => take(2, TokenKind::Le),
            ('<', _) => take(1, TokenKind::Lt),
            ('>', Some('=')) => take(2, TokenKind::Ge),
            ('>', _) => take(1, TokenKind::Gt),
            ('=', _) => take(1, TokenKind::Eq),
            ('+', _) => take(1, TokenKind::Plus),
            ('-', _) => take(1, TokenKind::Minus),
            ('*', _) => take(1, TokenKind::Star),
            ('/', _) => take(1, TokenKind::Slash),
            ('(', _) => take(1, TokenKind::LParen),
            (')', _) => take(1, TokenKind::RParen),
            (',', _) => take(1, TokenKind::Comma),
            (';', _) => take(1, TokenKind::Semicolon),
            ('.', _) => take(1, TokenKind::Dot),
            _ => None,
        }
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
    fn test_case_insensitive_keywords() {
        let kinds = kinds("PROGRAM t; Begin END.");
        assert_eq!(kinds[0], TokenKind::Program);
        assert!(kinds.contains(&TokenKind::Begin));
        assert!(kinds.contains(&TokenKind::End));
        assert!(kinds.contains(&TokenKind::Dot));
    }

    #[test]
    fn test_identifier_folds_but_lexeme_keeps_case() {
        let (tokens, _) = lex("MyVar := 1;");
        assert_eq!(tokens[0].kind, TokenKind::Ident("myvar".into()));
        assert_eq!(tokens[0].lexeme, "MyVar");
    }

    #[test]
    fn test_assign_vs_colon() {
        let kinds = kinds("x : integer; x := 1;");
        assert!(kinds.contains(&TokenKind::Colon));
        assert!(kinds.contains(&TokenKind::Assign));
    }

    #[test]
    fn test_doubled_apostrophe() {
        let (tokens, diags) = lex("s := 'it''s';");
        assert!(diags.is_empty());
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Str("it's".into())));
    }

    #[test]
    fn test_both_comment_forms() {
        let kinds = kinds("{ one } x (* two *) := 1;");
        assert_eq!(kinds[0], TokenKind::Ident("x".into()));
        assert_eq!(kinds[1], TokenKind::Assign);
    }

    #[test]
    fn test_unterminated_comment() {
        let (_, diags) = lex("{ never closed");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedComment));
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diags) = lex("s := 'oops\n");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
    }

    #[test]
    fn test_not_equal_operator() {
        assert!(kinds("a <> b").contains(&TokenKind::NotEq));
    }

    #[test]
    fn test_real_and_int() {
        let kinds = kinds("x := 3.14 + 2;");
        assert!(kinds.contains(&TokenKind::Real(3.14)));
        assert!(kinds.contains(&TokenKind::Int(2)));
    }
}
