//! JavaScript lexer.
//!
//! Handles `//` and `/* */` comments, single/double-quoted strings,
//! backtick template literals (split into text and `${...}` parts for
//! the parser to finish), and the usual operator zoo including `=>`,
//! `===`, and `**`.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{TemplatePart, Token, TokenKind};

/// Tokenize JavaScript source.
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
                ' ' | '\t' | '\n' | '\r' => {
                    self.advance();
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
                }
                '\'' | '"' => self.lex_string(c),
                '`' => self.lex_template(),
                _ if c.is_ascii_digit() => self.lex_number(),
                _ if c.is_alphabetic() || c == '_' || c == '$' => self.lex_word(),
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

    fn lex_word(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
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
        self.advance();
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
                    if let Some(escaped) = self.peek() {
                        value.push(decode_escape(escaped));
                        self.advance();
                    }
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

    /// Backtick templates: text runs and `${...}` interpolations.
    /// The interpolation source is captured raw; the parser finishes it.
    fn lex_template(&mut self) {
        let (line, col, start) = (self.line, self.col, self.offset());
        self.advance(); // backtick
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('`') => {
                    self.advance();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(text));
                    }
                    let span = self.span_from(line, col, start);
                    self.push(TokenKind::Template(parts), span);
                    return;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.peek() {
                        text.push(decode_escape(escaped));
                        self.advance();
                    }
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    self.advance();
                    self.advance();
                    let mut raw = String::new();
                    let mut depth = 1u32;
                    while let Some(c) = self.peek() {
                        if c == '{' {
                            depth += 1;
                        } else if c == '}' {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        raw.push(c);
                        self.advance();
                    }
                    if self.peek() == Some('}') {
                        self.advance();
                    }
                    parts.push(TemplatePart::Interp(raw));
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
                None => {
                    let span = self.span_from(line, col, start);
                    let message = "template literal is not terminated".to_string();
                    self.diags.push(Diagnostic::error(
                        Stage::Lex,
                        DiagKind::UnterminatedString,
                        message.clone(),
                        span,
                    ));
                    self.push(TokenKind::Error(message), span);
                    return;
                }
            }
        }
    }

    fn lex_operator(&mut self) -> Option<TokenKind> {
        let c = self.peek()?;
        let c2 = self.peek_at(1);
        let c3 = self.peek_at(2);
        let mut take = |n: usize, kind: TokenKind| {
            for _ in 0..n {
                self.advance();
            }
            Some(kind)
        };
        match (c, c2, c3) {
            ('=', Some('='), Some('=')) => take(3, TokenKind::EqEqEq),
            ('!', Some('='), Some('=')) => take(3, TokenKind::NotEqEq),
            ('=', Some('='), _) => take(2, TokenKind::EqEq),
            ('!', Some('='), _) => take(2, TokenKind::NotEq),
            ('=', Some('>'), _) => take(2, TokenKind::Arrow),
            ('=', _, _) => take(1, TokenKind::Assign),
            ('+', Some('+'), _) => take(2, TokenKind::PlusPlus),
            ('+', Some('='), _) => take(2, TokenKind::PlusEq),
            ('+', _, _) => take(1, TokenKind::Plus),
            ('-', Some('-'), _) => take(2, TokenKind::MinusMinus),
            ('-', Some('='), _) => take(2, TokenKind::MinusEq),
            ('-', _, _) => take(1, TokenKind::Minus),
            ('*', Some('*'), _) => take(2, TokenKind::StarStar),
            ('*', Some('='), _) => take(2, TokenKind::StarEq),
            ('*', _, _) => take(1, TokenKind::Star),
            ('/', Some('='), _) => take(2, TokenKind::SlashEq),
            ('/', _, _) => take(1, TokenKind::Slash),
            ('%', _, _) => take(1, TokenKind::Percent),
            ('<', Some('<'), _) => take(2, TokenKind::Shl),
            ('<', Some('='), _) => take(2, TokenKind::Le),
            ('<', _, _) => take(1, TokenKind::Lt),
            ('>', Some('>'), _) => take(2, TokenKind::Shr),
            ('>', Some('='), _) => take(2, TokenKind::Ge),
            ('>', _, _) => take(1, TokenKind::Gt),
            ('&', Some('&'), _) => take(2, TokenKind::AndAnd),
            ('&', _, _) => take(1, TokenKind::Amp),
            ('|', Some('|'), _) => take(2, TokenKind::OrOr),
            ('|', _, _) => take(1, TokenKind::Pipe),
            ('^', _, _) => take(1, TokenKind::Caret),
            ('!', _, _) => take(1, TokenKind::Not),
            ('?', _, _) => take(1, TokenKind::Question),
            (':', _, _) => take(1, TokenKind::Colon),
            ('(', _, _) => take(1, TokenKind::LParen),
            (')', _, _) => take(1, TokenKind::RParen),
            ('{', _, _) => take(1, TokenKind::LBrace),
            ('}', _, _) => take(1, TokenKind::RBrace),
            ('[', _, _) => take(1, TokenKind::LBracket),
            (']', _, _) => take(1, TokenKind::RBracket),
            (',', _, _) => take(1, TokenKind::Comma),
            (';', _, _) => take(1, TokenKind::Semicolon),
            ('.', _, _) => take(1, TokenKind::Dot),
            _ => None,
        }
    }
}

fn decode_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
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
    fn test_let_and_operators() {
        let kinds = kinds("let t = 0;");
        assert_eq!(kinds[0], TokenKind::Let);
        assert_eq!(kinds[1], TokenKind::Ident("t".into()));
        assert_eq!(kinds[2], TokenKind::Assign);
        assert_eq!(kinds[3], TokenKind::Int(0));
        assert_eq!(kinds[4], TokenKind::Semicolon);
    }

    #[test]
    fn test_three_char_operators() {
        let kinds = kinds("a === b !== c");
        assert!(kinds.contains(&TokenKind::EqEqEq));
        assert!(kinds.contains(&TokenKind::NotEqEq));
    }

    #[test]
    fn test_arrow_vs_assign() {
        let kinds = kinds("x => x >= 1");
        assert!(kinds.contains(&TokenKind::Arrow));
        assert!(kinds.contains(&TokenKind::Ge));
    }

    #[test]
    fn test_increment_and_compound() {
        let kinds = kinds("i++; t += i;");
        assert!(kinds.contains(&TokenKind::PlusPlus));
        assert!(kinds.contains(&TokenKind::PlusEq));
    }

    #[test]
    fn test_comments_discarded() {
        let kinds = kinds("// line\nx /* block */ = 1;");
        assert_eq!(kinds[0], TokenKind::Ident("x".into()));
        assert_eq!(kinds[1], TokenKind::Assign);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let (_, diags) = lex("x = 1; /* oops");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedComment));
    }

    #[test]
    fn test_template_parts() {
        let (tokens, diags) = lex("`a ${x + 1} b`");
        assert!(diags.is_empty());
        match &tokens[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Text("a ".into()));
                assert_eq!(parts[1], TemplatePart::Interp("x + 1".into()));
                assert_eq!(parts[2], TemplatePart::Text(" b".into()));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_template_nested_braces() {
        let (tokens, _) = lex("`${ {a: 1}.a }`");
        match &tokens[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(&parts[0], TemplatePart::Interp(raw) if raw.contains("{a: 1}")));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, _) = lex("'a\\nb'");
        assert_eq!(tokens[0].kind, TokenKind::Str("a\nb".into()));
        assert_eq!(tokens[0].lexeme, "'a\\nb'");
    }

    #[test]
    fn test_eof_terminated() {
        let (tokens, _) = lex("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_dollar_identifier() {
        let kinds = kinds("let $el = _x;");
        assert!(kinds.contains(&TokenKind::Ident("$el".into())));
        assert!(kinds.contains(&TokenKind::Ident("_x".into())));
    }
}
