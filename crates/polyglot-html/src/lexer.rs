//! HTML lexer — a context-sensitive mode machine.
//!
//! The machine is the declarative heart of the lexer: [`Mode`] names
//! the current context and [`step`] is the (mode, input-class) →
//! (emit, next-mode) table. The driver loop below it only feeds
//! characters through the table and materializes tokens.

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::token::{QuoteStyle, Token, TokenKind};

/// Lexer context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Between tags: text runs until `<`.
    Content,
    /// Just consumed `<`: a tag name must follow.
    AfterLt,
    /// Just consumed `</`: a closing tag name must follow.
    AfterLtSlash,
    /// Inside a tag, before or between attributes.
    InTag,
    /// Just consumed an attribute name.
    AfterAttrName,
    /// Just consumed `=`: an attribute value must follow.
    AfterAttrEq,
}

/// Classified input at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Lt,
    LtSlash,
    LtBang,
    Gt,
    SlashGt,
    Equals,
    Quote(char),
    WhitespaceRun,
    NameRun,
    TextRun,
    Other,
}

/// What the table tells the driver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    EmitTagOpen,
    EmitTagClose,
    EmitTagEnd,
    EmitSelfClose,
    EmitEquals,
    EmitTagName,
    EmitAttrName,
    EmitAttrValueQuoted(char),
    EmitAttrValueUnquoted,
    EmitText,
    EmitWhitespace,
    EmitMarkupDecl,
    ErrorChar,
}

/// The transition table: one row per (mode, class) pair.
fn step(mode: Mode, class: Class) -> (Action, Mode) {
    use Action::*;
    use Class::*;
    use Mode::*;
    match (mode, class) {
        (Content, Lt) => (EmitTagOpen, AfterLt),
        (Content, LtSlash) => (EmitTagClose, AfterLtSlash),
        (Content, LtBang) => (EmitMarkupDecl, Content),
        (Content, _) => (EmitText, Content),

        (AfterLt, NameRun) => (EmitTagName, InTag),
        (AfterLt, _) => (ErrorChar, Content),

        (AfterLtSlash, NameRun) => (EmitTagName, InTag),
        (AfterLtSlash, _) => (ErrorChar, Content),

        (InTag, WhitespaceRun) => (EmitWhitespace, InTag),
        (InTag, Gt) => (EmitTagEnd, Content),
        (InTag, SlashGt) => (EmitSelfClose, Content),
        (InTag, NameRun) => (EmitAttrName, AfterAttrName),
        (InTag, _) => (ErrorChar, InTag),

        (AfterAttrName, WhitespaceRun) => (EmitWhitespace, AfterAttrName),
        (AfterAttrName, Equals) => (EmitEquals, AfterAttrEq),
        (AfterAttrName, Gt) => (EmitTagEnd, Content),
        (AfterAttrName, SlashGt) => (EmitSelfClose, Content),
        (AfterAttrName, NameRun) => (EmitAttrName, AfterAttrName),
        (AfterAttrName, _) => (ErrorChar, InTag),

        (AfterAttrEq, WhitespaceRun) => (EmitWhitespace, AfterAttrEq),
        (AfterAttrEq, Quote(q)) => (EmitAttrValueQuoted(q), InTag),
        (AfterAttrEq, Gt) => (EmitTagEnd, Content),
        (AfterAttrEq, _) => (EmitAttrValueUnquoted, InTag),
    }
}

/// Tokenize HTML source.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(u32, char)>,
    pos: usize,
    line: u32,
    col: u32,
    mode: Mode,
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
            mode: Mode::Content,
            tokens: Vec::new(),
            diags: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while self.pos < self.chars.len() {
            let class = self.classify();
            let (action, next) = step(self.mode, class);
            self.apply(action);
            self.mode = next;
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            span: Span::point(self.line, self.col, self.offset()),
        });
        (self.tokens, self.diags)
    }

    fn classify(&self) -> Class {
        let c = self.chars[self.pos].1;
        match self.mode {
            Mode::Content => match c {
                '<' if self.peek_at(1) == Some('!') => Class::LtBang,
                '<' if self.peek_at(1) == Some('/') => Class::LtSlash,
                '<' if self.peek_at(1).is_some_and(|d| d.is_alphabetic()) => Class::Lt,
                _ => Class::TextRun,
            },
            _ => match c {
                '>' => Class::Gt,
                '/' if self.peek_at(1) == Some('>') => Class::SlashGt,
                '=' => Class::Equals,
                '"' | '\'' => Class::Quote(c),
                c if c.is_whitespace() => Class::WhitespaceRun,
                c if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' => Class::NameRun,
                _ => Class::Other,
            },
        }
    }

    fn apply(&mut self, action: Action) {
        let (line, col, start) = (self.line, self.col, self.offset());
        match action {
            Action::EmitTagOpen => {
                self.advance();
                self.push(TokenKind::TagOpen, self.span_from(line, col, start));
            }
            Action::EmitTagClose => {
                self.advance();
                self.advance();
                self.push(TokenKind::TagClose, self.span_from(line, col, start));
            }
            Action::EmitTagEnd => {
                self.advance();
                self.push(TokenKind::TagEnd, self.span_from(line, col, start));
            }
            Action::EmitSelfClose => {
                self.advance();
                self.advance();
                self.push(TokenKind::SelfClose, self.span_from(line, col, start));
            }
            Action::EmitEquals => {
                self.advance();
                self.push(TokenKind::Equals, self.span_from(line, col, start));
            }
            Action::EmitTagName | Action::EmitAttrName => {
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let span = self.span_from(line, col, start);
                let name = self.src[span.offset as usize..span.end() as usize].to_lowercase();
                let kind = if matches!(action, Action::EmitTagName) {
                    TokenKind::TagName(name)
                } else {
                    TokenKind::AttrName(name)
                };
                self.push(kind, span);
            }
            Action::EmitAttrValueQuoted(quote) => {
                self.advance(); // opening quote
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = self.peek() {
                    if c == quote {
                        self.advance();
                        closed = true;
                        break;
                    }
                    value.push(c);
                    self.advance();
                }
                let span = self.span_from(line, col, start);
                if closed {
                    let style = if quote == '"' {
                        QuoteStyle::Double
                    } else {
                        QuoteStyle::Single
                    };
                    self.push(TokenKind::AttrValue(value, style), span);
                } else {
                    let message = "attribute value is not terminated".to_string();
                    self.diags.push(Diagnostic::error(
                        Stage::Lex,
                        DiagKind::UnterminatedString,
                        message.clone(),
                        span,
                    ));
                    self.push(TokenKind::Error(message), span);
                }
            }
            Action::EmitAttrValueUnquoted => {
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' || (c == '/' && self.peek_at(1) == Some('>'))
                    {
                        break;
                    }
                    self.advance();
                }
                let span = self.span_from(line, col, start);
                let value = self.src[span.offset as usize..span.end() as usize].to_string();
                self.push(TokenKind::AttrValue(value, QuoteStyle::Unquoted), span);
            }
            Action::EmitText => {
                // Take at least one char so a stray `<` makes progress.
                self.advance();
                while let Some(c) = self.peek() {
                    if c == '<' {
                        break;
                    }
                    self.advance();
                }
                let span = self.span_from(line, col, start);
                let text = self.src[span.offset as usize..span.end() as usize].to_string();
                self.push(TokenKind::Text(text), span);
            }
            Action::EmitWhitespace => {
                while let Some(c) = self.peek() {
                    if c.is_whitespace() {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.push(TokenKind::Whitespace, self.span_from(line, col, start));
            }
            Action::EmitMarkupDecl => self.lex_markup_decl(line, col, start),
            Action::ErrorChar => {
                let c = self.chars[self.pos].1;
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

    /// `<!DOCTYPE ...>` or `<!-- ... -->`.
    fn lex_markup_decl(&mut self, line: u32, col: u32, start: u32) {
        if self.peek_at(2) == Some('-') && self.peek_at(3) == Some('-') {
            // Comment.
            for _ in 0..4 {
                self.advance();
            }
            let body_start = self.offset();
            let mut closed = false;
            while self.pos < self.chars.len() {
                if self.peek() == Some('-')
                    && self.peek_at(1) == Some('-')
                    && self.peek_at(2) == Some('>')
                {
                    closed = true;
                    break;
                }
                self.advance();
            }
            let body_end = self.offset();
            let text = self.src[body_start as usize..body_end as usize].to_string();
            if closed {
                for _ in 0..3 {
                    self.advance();
                }
                let span = self.span_from(line, col, start);
                self.push(TokenKind::Comment(text), span);
            } else {
                let span = self.span_from(line, col, start);
                let message = "comment is not terminated".to_string();
                self.diags.push(Diagnostic::error(
                    Stage::Lex,
                    DiagKind::UnterminatedComment,
                    message.clone(),
                    span,
                ));
                self.push(TokenKind::Error(message), span);
            }
        } else {
            // Declaration (doctype).
            self.advance(); // <
            self.advance(); // !
            let body_start = self.offset();
            let mut closed = false;
            while let Some(c) = self.peek() {
                if c == '>' {
                    closed = true;
                    break;
                }
                self.advance();
            }
            let body = self.src[body_start as usize..self.offset() as usize].to_string();
            if closed {
                self.advance();
                let span = self.span_from(line, col, start);
                self.push(TokenKind::Doctype(body), span);
            } else {
                let span = self.span_from(line, col, start);
                let message = "markup declaration is not terminated".to_string();
                self.diags.push(Diagnostic::error(
                    Stage::Lex,
                    DiagKind::UnterminatedDirective,
                    message.clone(),
                    span,
                ));
                self.push(TokenKind::Error(message), span);
            }
        }
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
    fn test_simple_element() {
        let kinds = kinds("<p>hi</p>");
        assert_eq!(
            kinds,
            vec![
                TokenKind::TagOpen,
                TokenKind::TagName("p".into()),
                TokenKind::TagEnd,
                TokenKind::Text("hi".into()),
                TokenKind::TagClose,
                TokenKind::TagName("p".into()),
                TokenKind::TagEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_doctype() {
        let kinds = kinds("<!DOCTYPE html><html></html>");
        assert!(matches!(&kinds[0], TokenKind::Doctype(body) if body == "DOCTYPE html"));
    }

    #[test]
    fn test_comment() {
        let kinds = kinds("<!-- note --><p></p>");
        assert!(matches!(&kinds[0], TokenKind::Comment(text) if text == " note "));
    }

    #[test]
    fn test_attributes_quoted_and_unquoted() {
        let kinds = kinds("<a href=\"x\" id='y' data=z>");
        assert!(kinds.contains(&TokenKind::AttrName("href".into())));
        assert!(kinds.contains(&TokenKind::AttrValue("x".into(), QuoteStyle::Double)));
        assert!(kinds.contains(&TokenKind::AttrValue("y".into(), QuoteStyle::Single)));
        assert!(kinds.contains(&TokenKind::AttrValue("z".into(), QuoteStyle::Unquoted)));
    }

    #[test]
    fn test_boolean_attribute() {
        let kinds = kinds("<input disabled>");
        assert!(kinds.contains(&TokenKind::AttrName("disabled".into())));
        assert!(kinds.contains(&TokenKind::TagEnd));
    }

    #[test]
    fn test_self_close() {
        let kinds = kinds("<br/>");
        assert!(kinds.contains(&TokenKind::SelfClose));
    }

    #[test]
    fn test_names_fold_but_lexeme_keeps_case() {
        let (tokens, _) = lex("<DIV Class=\"a\"></DIV>");
        let tag = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::TagName(_)))
            .unwrap();
        assert_eq!(tag.kind, TokenKind::TagName("div".into()));
        assert_eq!(tag.lexeme, "DIV");
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::AttrName("class".into())));
    }

    #[test]
    fn test_text_preserves_whitespace() {
        let kinds = kinds("<p>a b</p>");
        assert!(kinds.contains(&TokenKind::Text("a b".into())));
    }

    #[test]
    fn test_stray_lt_is_text() {
        let kinds = kinds("a < b");
        assert!(matches!(&kinds[0], TokenKind::Text(t) if t == "a "));
        // `< b` cannot open a tag; it stays text.
        assert!(kinds
            .iter()
            .filter(|k| matches!(k, TokenKind::Text(_)))
            .count()
            >= 2);
    }

    #[test]
    fn test_unterminated_comment() {
        let (_, diags) = lex("<!-- never closed");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedComment));
    }

    #[test]
    fn test_unterminated_attr_value() {
        let (_, diags) = lex("<a href=\"oops>");
        assert!(diags.iter().any(|d| d.kind == DiagKind::UnterminatedString));
    }

    #[test]
    fn test_whitespace_tokens_in_tag() {
        let kinds = kinds("<a  href=\"x\">");
        assert!(kinds.contains(&TokenKind::Whitespace));
    }
}
