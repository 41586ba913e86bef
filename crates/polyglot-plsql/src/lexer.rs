//! PL/SQL lexer.
//!
//! Key rules:
//! - Keywords are case-insensitive; unquoted identifiers fold to
//!   uppercase. `SQLCODE`/`SQLERRM`/`SYSDATE`/`USER`/`UID`/`ROWNUM`
//!   are reclassified to identifiers at this boundary.
//! - Strings are `'...'` with `''` as the escaped quote, plus the
//!   alternate `q'[...]'` form with bracket-pair delimiters.
//! - `DATE '...'` produces one date-literal token.
//! - The rule for `.` is ordered: `..` (range), then a float starting
//!   with `.`, then the plain dot.
//! - Comments are `--` to end of line and `/* ... */`.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{Token, TokenKind};

/// Tokenize PL/SQL source.
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
                'q' | 'Q' if self.peek_at(1) == Some('\'') => self.lex_q_string(line, col, start),
                '.' => {
                    // Rule order matters: `..`, then `.digits`, then `.`.
                    if self.peek_at(1) == Some('.') {
                        self.advance();
                        self.advance();
                        self.push(TokenKind::DotDot, self.span_from(line, col, start));
                    } else if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        self.lex_number();
                    } else {
                        self.advance();
                        self.push(TokenKind::Dot, self.span_from(line, col, start));
                    }
                }
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
                        // `DATE '...'` becomes one literal token.
                        if matches!(self.tokens.last().map(|t| &t.kind), Some(TokenKind::Date)) {
                            self.tokens.pop();
                            self.push(TokenKind::DateLit(value), span);
                        } else {
                            self.push(TokenKind::Str(value), span);
                        }
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

    /// Alternate quoting: `q'[ ... ]'` (also `{} () <>` or any char).
    fn lex_q_string(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // q
        self.advance(); // '
        let open = match self.peek() {
            Some(c) => c,
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
        };
        self.advance();
        let close = match open {
            '[' => ']',
            '{' => '}',
            '(' => ')',
            '<' => '>',
            other => other,
        };
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(c) if c == close && self.peek_at(1) == Some('\'') => {
                    self.advance();
                    self.advance();
                    let span = self.span_from(line, col, start);
                    self.push(TokenKind::Str(value), span);
                    return;
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

    fn lex_number(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.'
                && !is_float
                // `1..5` keeps the range operator intact.
                && self.peek_at(1) != Some('.')
                && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
            {
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
        let kind = TokenKind::keyword(word)
            .unwrap_or_else(|| TokenKind::Ident(word.to_ascii_uppercase()));
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
            ('|', Some('|')) => take(2, TokenKind::Concat),
            ('!', Some('=')) => take(2, TokenKind::Ne),
            ('<', Some('>')) => take(2, TokenKind::Ne),
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
        let kinds = kinds("begin END Declare");
        assert_eq!(kinds[0], TokenKind::Begin);
        assert_eq!(kinds[1], TokenKind::End);
        assert_eq!(kinds[2], TokenKind::Declare);
    }

    #[test]
    fn test_identifiers_fold_to_uppercase() {
        let (tokens, _) = lex("my_var");
        assert_eq!(tokens[0].kind, TokenKind::Ident("MY_VAR".into()));
        assert_eq!(tokens[0].lexeme, "my_var");
    }

    #[test]
    fn test_ident_like_keywords_stay_identifiers() {
        let kinds = kinds("sysdate SQLCODE sqlerrm user uid rownum");
        for kind in &kinds[..6] {
            assert!(matches!(kind, TokenKind::Ident(_)), "got {kind:?}");
        }
    }

    #[test]
    fn test_doubled_quote_escape() {
        let kinds = kinds("'it''s'");
        assert_eq!(kinds[0], TokenKind::Str("it's".into()));
    }

    #[test]
    fn test_q_string() {
        let kinds = kinds("q'[don't worry]'");
        assert_eq!(kinds[0], TokenKind::Str("don't worry".into()));
    }

    #[test]
    fn test_q_string_paren_delims() {
        let kinds = kinds("q'(a(b)c)'");
        // The closer is the first `)'` pair.
        assert_eq!(kinds[0], TokenKind::Str("a(b)c".into()));
    }

    #[test]
    fn test_date_literal() {
        let kinds = kinds("DATE '2024-01-15'");
        assert_eq!(kinds[0], TokenKind::DateLit("2024-01-15".into()));
    }

    #[test]
    fn test_range_vs_float() {
        {
            let kinds = kinds("1..5");
            assert_eq!(
                kinds[..3],
                [TokenKind::Int(1), TokenKind::DotDot, TokenKind::Int(5)]
            );
        }
        let kinds = kinds("1.5 .25");
        assert_eq!(kinds[0], TokenKind::Float(1.5));
        assert_eq!(kinds[1], TokenKind::Float(0.25));
    }

    #[test]
    fn test_concat_operator() {
        assert!(kinds("'a' || 'b'").contains(&TokenKind::Concat));
    }

    #[test]
    fn test_comments() {
        let kinds = kinds("x := 1; -- set\n/* block */ y := 2;");
        assert!(kinds.contains(&TokenKind::Ident("X".into())));
        assert!(kinds.contains(&TokenKind::Ident("Y".into())));
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diags) = lex("'oops");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
    }

    #[test]
    fn test_assignment_and_slash() {
        let kinds = kinds("x := 1;\n/");
        assert!(kinds.contains(&TokenKind::Assign));
        assert!(kinds.contains(&TokenKind::Slash));
    }
}
