//! T-SQL lexer.
//!
//! Key rules:
//! - Keywords are case-insensitive; identifiers fold to uppercase.
//! - `@name` and `@@name` are variable tokens.
//! - `GO` is recognized as a keyword (a batch separator).
//! - Comments are `--` to end of line and `/* ... */`.
//! - Strings are `'...'` with `''` as the escaped quote.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{Token, TokenKind};

/// Tokenize T-SQL source.
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
                '-' if self.peek_at(1) == Some('-') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
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
                '\'' => self.lex_string(line, col, start),
                '@' => self.lex_variable(line, col, start),
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

    // -- cursor ----------------------------------------------------------

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

    // -- scanners --------------------------------------------------------

    fn lex_string(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    if self.peek() == Some('\'') {
                        value.push('\'');
                        self.advance();
                    } else {
                        let span = self.span_from(line, col, start);
                        self.push(TokenKind::Str(value), span);
                        return;
                    }
                }
                None => {
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

    /// `@name` or `@@name`, folded to uppercase with the sigils kept.
    fn lex_variable(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // @
        if self.peek() == Some('@') {
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let span = self.span_from(line, col, start);
        let text = &self.src[span.offset as usize..span.end() as usize];
        self.push(TokenKind::Var(text.to_ascii_uppercase()), span);
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
        // Identifiers keep their written spelling; matching elsewhere
        // is case-insensitive.
        let kind = TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
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
            ('<', Some('>')) => take(2, TokenKind::Ne),
            ('!', Some('=')) => take(2, TokenKind::Ne),
            ('<', Some('=')) => take(2, TokenKind::Le),
            ('<', _) => take(1, TokenKind::Lt),
            ('>', Some('=')) => take(2, TokenKind::Ge),
            ('>', _) => take(1, TokenKind::Gt),
            ('=', _) => take(1, TokenKind::Eq),
            ('+', _) => take(1, TokenKind::Plus),
            ('-', _) => take(1, TokenKind::Minus),
            ('*', _) => take(1, TokenKind::Star),
            ('/', _) => take(1, TokenKind::Slash),
            ('%', _) => take(1, TokenKind::Percent),
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
        let kinds = kinds("select * from t");
        assert_eq!(kinds[0], TokenKind::Select);
        assert_eq!(kinds[1], TokenKind::Star);
        assert_eq!(kinds[2], TokenKind::From);
        assert_eq!(kinds[3], TokenKind::Ident("t".into()));
    }

    #[test]
    fn test_at_variables() {
        let kinds = kinds("DECLARE @count INT");
        assert_eq!(kinds[1], TokenKind::Var("@COUNT".into()));
    }

    #[test]
    fn test_double_at_system_variable() {
        let kinds = kinds("PRINT @@VERSION");
        assert_eq!(kinds[1], TokenKind::Var("@@VERSION".into()));
    }

    #[test]
    fn test_go_is_keyword() {
        let kinds = kinds("PRINT 'a'\nGO\nPRINT 'b'");
        assert!(kinds.contains(&TokenKind::Go));
    }

    #[test]
    fn test_string_with_doubled_quote() {
        assert!(kinds("PRINT 'it''s'").contains(&TokenKind::Str("it's".into())));
    }

    #[test]
    fn test_comments() {
        let kinds = kinds("-- line\nSELECT /* block */ 1 FROM t");
        assert_eq!(kinds[0], TokenKind::Select);
        assert!(kinds.contains(&TokenKind::Int(1)));
    }

    #[test]
    fn test_ne_forms() {
        assert!(kinds("a <> b").contains(&TokenKind::Ne));
        assert!(kinds("a != b").contains(&TokenKind::Ne));
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diags) = lex("PRINT 'oops");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
    }

    #[test]
    fn test_ends_with_eof() {
        let (tokens, _) = lex("");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }
}
