//! C++ lexer.
//!
//! Key rules:
//! - A `#` as the first non-blank character of a line starts a
//!   preprocessor token that consumes to end of line; `#include`
//!   payloads decode the header name and kind.
//! - Raw string literals `R"delim(...)delim"` are supported.
//! - Integer literal suffixes (`u`, `l`, `ll`, any case, combined)
//!   are stripped; the decoded value keeps the numeric part.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{HeaderKind, PreprocPayload, Token, TokenKind};

/// Tokenize C++ source.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(u32, char)>,
    pos: usize,
    line: u32,
    col: u32,
    /// Only whitespace seen since the last newline.
    at_line_start: bool,
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
            at_line_start: true,
            tokens: Vec::new(),
            diags: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while let Some(c) = self.peek() {
            let (line, col, start) = (self.line, self.col, self.offset());
            match c {
                '\n' => {
                    self.advance();
                    self.at_line_start = true;
                }
                ' ' | '\t' | '\r' => self.advance(),
                '#' if self.at_line_start => {
                    self.lex_preproc(line, col, start);
                    self.at_line_start = true;
                }
                '/' if self.peek_at(1) == Some('/') => {
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
                            "block comment is not terminated",
                            self.span_from(line, col, start),
                        ));
                    }
                    self.at_line_start = false;
                }
                'R' if self.peek_at(1) == Some('"') => {
                    self.lex_raw_string(line, col, start);
                    self.at_line_start = false;
                }
                '"' => {
                    self.lex_string();
                    self.at_line_start = false;
                }
                '\'' => {
                    self.lex_char();
                    self.at_line_start = false;
                }
                _ if c.is_ascii_digit() => {
                    self.lex_number();
                    self.at_line_start = false;
                }
                _ if c.is_alphabetic() || c == '_' => {
                    self.lex_word();
                    self.at_line_start = false;
                }
                _ => {
                    self.at_line_start = false;
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

    /// Consume a whole `#...` line into one token and decode it.
    fn lex_preproc(&mut self, line: u32, col: u32, start: u32) {
        while self.peek().is_some() && self.peek() != Some('\n') {
            self.advance();
        }
        let span = self.span_from(line, col, start);
        let text = &self.src[span.offset as usize..span.end() as usize];
        let body = text.trim_start().trim_start_matches('#').trim_start();
        let (directive, rest) = match body.find(char::is_whitespace) {
            Some(i) => (&body[..i], body[i..].trim()),
            None => (body, ""),
        };

        let mut payload = PreprocPayload {
            directive: directive.to_string(),
            header_file: None,
            header_kind: None,
            args: rest.to_string(),
        };
        if directive == "include" {
            if let Some(stripped) = rest.strip_prefix('<') {
                if let Some(end) = stripped.find('>') {
                    payload.header_file = Some(stripped[..end].to_string());
                    payload.header_kind = Some(HeaderKind::System);
                } else {
                    self.diags.push(Diagnostic::error(
                        Stage::Lex,
                        DiagKind::UnterminatedDirective,
                        "include header name is not terminated",
                        span,
                    ));
                }
            } else if let Some(stripped) = rest.strip_prefix('"') {
                if let Some(end) = stripped.find('"') {
                    payload.header_file = Some(stripped[..end].to_string());
                    payload.header_kind = Some(HeaderKind::User);
                } else {
                    self.diags.push(Diagnostic::error(
                        Stage::Lex,
                        DiagKind::UnterminatedDirective,
                        "include header name is not terminated",
                        span,
                    ));
                }
            }
        }
        self.push(TokenKind::Preproc(payload), span);
        if self.peek() == Some('\n') {
            self.advance();
        }
    }

    fn lex_raw_string(&mut self, line: u32, col: u32, start: u32) {
        self.advance(); // R
        self.advance(); // "
        let mut delim = String::new();
        while let Some(c) = self.peek() {
            if c == '(' {
                break;
            }
            delim.push(c);
            self.advance();
        }
        self.advance(); // (
        let closer = format!("){delim}\"");
        let closer_chars: Vec<char> = closer.chars().collect();
        let mut value = String::new();
        loop {
            if self.pos >= self.chars.len() {
                let span = self.span_from(line, col, start);
                let message = "raw string literal is not terminated".to_string();
                self.diags.push(Diagnostic::error(
                    Stage::Lex,
                    DiagKind::UnterminatedString,
                    message.clone(),
                    span,
                ));
                self.push(TokenKind::Error(message), span);
                return;
            }
            let matches_closer = closer_chars
                .iter()
                .enumerate()
                .all(|(i, &c)| self.peek_at(i) == Some(c));
            if matches_closer {
                for _ in 0..closer_chars.len() {
                    self.advance();
                }
                let span = self.span_from(line, col, start);
                self.push(TokenKind::Str(value), span);
                return;
            }
            value.push(self.peek().expect("bounds checked above"));
            self.advance();
        }
    }

    fn lex_string(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    let span = self.span_from(line, col, start);
                    self.push(TokenKind::Str(value), span);
                    return;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.peek() {
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            '0' => '\0',
                            other => other,
                        });
                        self.advance();
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

    fn lex_char(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        self.advance(); // opening quote
        let value = match self.peek() {
            Some('\\') => {
                self.advance();
                let c = match self.peek() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('0') => '\0',
                    Some(other) => other,
                    None => '\0',
                };
                self.advance();
                c
            }
            Some(c) => {
                self.advance();
                c
            }
            None => '\0',
        };
        if self.peek() == Some('\'') {
            self.advance();
            let span = self.span_from(line, col, start);
            self.push(TokenKind::CharLit(value), span);
        } else {
            let span = self.span_from(line, col, start);
            let message = "character literal is not terminated".to_string();
            self.diags.push(Diagnostic::error(
                Stage::Lex,
                DiagKind::UnterminatedString,
                message.clone(),
                span,
            ));
            self.push(TokenKind::Error(message), span);
        }
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
        let digits_end = self.offset();
        // Strip integer suffixes: u, l, ll, ul, llu, any case.
        if !is_float {
            while matches!(self.peek(), Some('u') | Some('U') | Some('l') | Some('L')) {
                self.advance();
            }
        } else if matches!(self.peek(), Some('f') | Some('F')) {
            self.advance();
        }
        let span = self.span_from(line, col, start);
        let digits = &self.src[span.offset as usize..digits_end as usize];
        let kind = if is_float {
            match digits.parse::<f64>() {
                Ok(x) => TokenKind::Float(x),
                Err(_) => self.bad_number(digits, span),
            }
        } else {
            match digits.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => self.bad_number(digits, span),
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
            (':', Some(':')) => take(2, TokenKind::ColonColon),
            (':', _) => take(1, TokenKind::Colon),
            ('+', Some('+')) => take(2, TokenKind::PlusPlus),
            ('+', Some('=')) => take(2, TokenKind::PlusEq),
            ('+', _) => take(1, TokenKind::Plus),
            ('-', Some('-')) => take(2, TokenKind::MinusMinus),
            ('-', Some('=')) => take(2, TokenKind::MinusEq),
            ('-', _) => take(1, TokenKind::Minus),
            ('*', Some('=')) => take(2, TokenKind::StarEq),
            ('*', _) => take(1, TokenKind::Star),
            ('/', Some('=')) => take(2, TokenKind::SlashEq),
            ('/', _) => take(1, TokenKind::Slash),
            ('%', _) => take(1, TokenKind::Percent),
            ('=', Some('=')) => take(2, TokenKind::EqEq),
            ('=', _) => take(1, TokenKind::Assign),
            ('!', Some('=')) => take(2, TokenKind::NotEq),
            ('!', _) => take(1, TokenKind::Not),
            ('<', Some('<')) => take(2, TokenKind::Shl),
            ('<', Some('=')) => take(2, TokenKind::Le),
            ('<', _) => take(1, TokenKind::Lt),
            ('>', Some('>')) => take(2, TokenKind::Shr),
            ('>', Some('=')) => take(2, TokenKind::Ge),
            ('>', _) => take(1, TokenKind::Gt),
            ('&', Some('&')) => take(2, TokenKind::AndAnd),
            ('&', _) => take(1, TokenKind::Amp),
            ('|', Some('|')) => take(2, TokenKind::OrOr),
            ('|', _) => take(1, TokenKind::Pipe),
            ('^', _) => take(1, TokenKind::Caret),
            ('?', _) => take(1, TokenKind::Question),
            ('(', _) => take(1, TokenKind::LParen),
            (')', _) => take(1, TokenKind::RParen),
            ('{', _) => take(1, TokenKind::LBrace),
            ('}', _) => take(1, TokenKind::RBrace),
            ('[', _) => take(1, TokenKind::LBracket),
            (']', _) => take(1, TokenKind::RBracket),
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
    fn test_include_system_header() {
        let (tokens, diags) = lex("#include <iostream>\nint x;");
        assert!(diags.is_empty());
        match &tokens[0].kind {
            TokenKind::Preproc(payload) => {
                assert_eq!(payload.directive, "include");
                assert_eq!(payload.header_file.as_deref(), Some("iostream"));
                assert_eq!(payload.header_kind, Some(HeaderKind::System));
            }
            other => panic!("expected preproc, got {other:?}"),
        }
        assert_eq!(tokens[1].kind, TokenKind::KwInt);
    }

    #[test]
    fn test_include_user_header() {
        let (tokens, _) = lex("#include \"util.h\"\n");
        match &tokens[0].kind {
            TokenKind::Preproc(payload) => {
                assert_eq!(payload.header_kind, Some(HeaderKind::User));
                assert_eq!(payload.header_file.as_deref(), Some("util.h"));
            }
            other => panic!("expected preproc, got {other:?}"),
        }
    }

    #[test]
    fn test_define_keeps_args() {
        let (tokens, _) = lex("#define MAX 10\n");
        match &tokens[0].kind {
            TokenKind::Preproc(payload) => {
                assert_eq!(payload.directive, "define");
                assert_eq!(payload.args, "MAX 10");
                assert!(payload.header_file.is_none());
            }
            other => panic!("expected preproc, got {other:?}"),
        }
    }

    #[test]
    fn test_hash_mid_line_is_not_preproc() {
        let (tokens, diags) = lex("int x; # y\n");
        assert!(!matches!(tokens[0].kind, TokenKind::Preproc(_)));
        // The stray # is an error token instead.
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::UnrecognizedCharacter));
    }

    #[test]
    fn test_raw_string() {
        let (tokens, diags) = lex("auto s = R\"x(a \"quote\" b)x\";");
        assert!(diags.is_empty());
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Str("a \"quote\" b".into())));
    }

    #[test]
    fn test_int_suffixes_stripped() {
        let kinds = kinds("42u 42L 42ull 42LL");
        let ints = kinds
            .iter()
            .filter(|k| matches!(k, TokenKind::Int(42)))
            .count();
        assert_eq!(ints, 4);
    }

    #[test]
    fn test_scope_operator() {
        let kinds = kinds("std::cout");
        assert_eq!(kinds[0], TokenKind::Ident("std".into()));
        assert_eq!(kinds[1], TokenKind::ColonColon);
        assert_eq!(kinds[2], TokenKind::Ident("cout".into()));
    }

    #[test]
    fn test_shift_operators() {
        let kinds = kinds("cout << x >> y");
        assert!(kinds.contains(&TokenKind::Shl));
        assert!(kinds.contains(&TokenKind::Shr));
    }

    #[test]
    fn test_char_literal() {
        assert!(kinds("'a'").contains(&TokenKind::CharLit('a')));
        assert!(kinds("'\\n'").contains(&TokenKind::CharLit('\n')));
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diags) = lex("auto s = \"oops\n");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
    }
}
