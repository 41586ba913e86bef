//! HTML parser — builds the document tree from the mode-machine
//! token stream.
//!
//! Void elements never push onto the open-element stack; a closing
//! tag pops to the nearest matching open element (implicitly closing
//! anything dangling in between); open elements left at EOF are
//! implicitly closed and flagged.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{Document, Element, Node, NodeKind};
use crate::is_void_element;
use crate::token::{Token, TokenKind};

/// Parse a token stream into a document plus parse diagnostics.
pub fn parse(tokens: &[Token], abort: &AbortFlag) -> (Document, Vec<Diagnostic>) {
    Parser::new(tokens).run(abort)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diags: Vec<Diagnostic>,
    /// Open elements; the document root is index 0.
    stack: Vec<(Element, Span)>,
    /// Finished children per stack level, root level first.
    children: Vec<Vec<Node>>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            diags: Vec::new(),
            stack: Vec::new(),
            children: vec![Vec::new()],
        }
    }

    fn run(mut self, abort: &AbortFlag) -> (Document, Vec<Diagnostic>) {
        let start = self.current_span();
        while !self.at_eof() {
            if abort.is_set() {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Cancelled,
                    "parse cancelled",
                    self.current_span(),
                ));
                break;
            }
            self.parse_one();
        }

        // Implicitly close anything still open and flag it.
        while let Some((element, span)) = self.stack.pop() {
            self.diags.push(Diagnostic::error(
                Stage::Parse,
                DiagKind::BlockClosureMissing,
                format!("element '<{}>' is never closed", element.name),
                span,
            ));
            let children = self.children.pop().expect("level per open element");
            let node = Node {
                span,
                kind: NodeKind::Element(Element { children, ..element }),
            };
            self.children
                .last_mut()
                .expect("root level always present")
                .push(node);
        }

        let children = self.children.pop().unwrap_or_default();
        let span = match (children.first(), children.last()) {
            (Some(first), Some(last)) => first.span.cover(last.span),
            _ => start,
        };
        (Document { children, span }, self.diags)
    }

    // -- cursor ----------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn emit(&mut self, node: Node) {
        self.children
            .last_mut()
            .expect("root level always present")
            .push(node);
    }

    // -- items -----------------------------------------------------------

    fn parse_one(&mut self) {
        let tok = self.advance().clone();
        match tok.kind {
            TokenKind::Doctype(body) => self.emit(Node {
                kind: NodeKind::Doctype(body),
                span: tok.span,
            }),
            TokenKind::Comment(text) => self.emit(Node {
                kind: NodeKind::Comment(text),
                span: tok.span,
            }),
            TokenKind::Text(text) => self.emit(Node {
                kind: NodeKind::Text(text),
                span: tok.span,
            }),
            TokenKind::TagOpen => self.parse_start_tag(tok.span),
            TokenKind::TagClose => self.parse_end_tag(tok.span),
            TokenKind::Whitespace | TokenKind::Error(_) => {}
            other => {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Unexpected,
                    format!("unexpected token {other:?} in content"),
                    tok.span,
                ));
            }
        }
    }

    fn parse_start_tag(&mut self, start: Span) {
        let name = match &self.current().kind {
            TokenKind::TagName(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Unexpected,
                    "expected a tag name after '<'",
                    self.current_span(),
                ));
                return;
            }
        };

        let mut attrs: Vec<(String, Option<String>)> = Vec::new();
        let mut self_closed = false;
        loop {
            let tok = self.advance().clone();
            match tok.kind {
                TokenKind::Whitespace | TokenKind::Equals | TokenKind::Error(_) => {}
                TokenKind::AttrName(attr) => attrs.push((attr, None)),
                TokenKind::AttrValue(value, _) => {
                    if let Some(last) = attrs.last_mut() {
                        last.1 = Some(value);
                    }
                }
                TokenKind::SelfClose => {
                    self_closed = true;
                    break;
                }
                TokenKind::TagEnd => break,
                TokenKind::Eof => {
                    self.diags.push(Diagnostic::error(
                        Stage::Parse,
                        DiagKind::UnexpectedEof,
                        format!("tag '<{name}>' is not closed before end of input"),
                        tok.span,
                    ));
                    break;
                }
                other => {
                    self.diags.push(Diagnostic::error(
                        Stage::Parse,
                        DiagKind::Unexpected,
                        format!("unexpected token {other:?} inside a tag"),
                        tok.span,
                    ));
                }
            }
        }

        let element = Element {
            name: name.clone(),
            attrs,
            children: Vec::new(),
            self_closed,
        };
        if self_closed || is_void_element(&name) {
            self.emit(Node {
                kind: NodeKind::Element(element),
                span: start,
            });
        } else {
            self.stack.push((element, start));
            self.children.push(Vec::new());
        }
    }

    fn parse_end_tag(&mut self, start: Span) {
        let name = match &self.current().kind {
            TokenKind::TagName(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Unexpected,
                    "expected a tag name after '</'",
                    self.current_span(),
                ));
                return;
            }
        };
        // Swallow whitespace and the closing '>'.
        loop {
            match &self.current().kind {
                TokenKind::Whitespace => {
                    self.advance();
                }
                TokenKind::TagEnd => {
                    self.advance();
                    break;
                }
                _ => break,
            }
        }

        let matches_open = self.stack.iter().rev().any(|(e, _)| e.name == name);
        if !matches_open {
            self.diags.push(Diagnostic::error(
                Stage::Parse,
                DiagKind::Unexpected,
                format!("closing tag '</{name}>' matches no open element"),
                start,
            ));
            return;
        }

        // Pop to the matching element, implicitly closing inner ones.
        loop {
            let (element, open_span) = self.stack.pop().expect("matching element exists");
            let children = self.children.pop().expect("level per open element");
            let closed_name = element.name.clone();
            if closed_name != name {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::BlockClosureMissing,
                    format!("element '<{closed_name}>' implicitly closed by '</{name}>'"),
                    open_span,
                ));
            }
            let span = open_span.cover(start);
            self.emit(Node {
                kind: NodeKind::Element(Element { children, ..element }),
                span,
            });
            if closed_name == name {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_ok(src: &str) -> Document {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (doc, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.is_empty(), "parse: {diags:?}");
        doc
    }

    fn first_element(doc: &Document) -> &Element {
        doc.children
            .iter()
            .find_map(|n| match &n.kind {
                NodeKind::Element(e) => Some(e),
                _ => None,
            })
            .expect("an element")
    }

    #[test]
    fn test_nested_document() {
        let doc = parse_ok("<!DOCTYPE html><html><body><p>hi</p></body></html>");
        assert!(matches!(doc.children[0].kind, NodeKind::Doctype(_)));
        let html = first_element(&doc);
        assert_eq!(html.name, "html");
        match &html.children[0].kind {
            NodeKind::Element(body) => {
                assert_eq!(body.name, "body");
                match &body.children[0].kind {
                    NodeKind::Element(p) => {
                        assert_eq!(p.name, "p");
                        assert!(matches!(&p.children[0].kind, NodeKind::Text(t) if t == "hi"));
                    }
                    other => panic!("expected p, got {other:?}"),
                }
            }
            other => panic!("expected body, got {other:?}"),
        }
    }

    #[test]
    fn test_attributes() {
        let doc = parse_ok("<a href=\"x\" disabled>t</a>");
        let a = first_element(&doc);
        assert_eq!(a.attrs.len(), 2);
        assert_eq!(a.attrs[0], ("href".to_string(), Some("x".to_string())));
        assert_eq!(a.attrs[1], ("disabled".to_string(), None));
    }

    #[test]
    fn test_void_element_needs_no_close() {
        let doc = parse_ok("<p>a<br>b</p>");
        let p = first_element(&doc);
        assert_eq!(p.children.len(), 3);
        assert!(matches!(
            &p.children[1].kind,
            NodeKind::Element(e) if e.name == "br"
        ));
    }

    #[test]
    fn test_self_closing() {
        let doc = parse_ok("<div><img src=\"i.png\"/></div>");
        let div = first_element(&doc);
        assert!(matches!(
            &div.children[0].kind,
            NodeKind::Element(e) if e.name == "img" && e.self_closed
        ));
    }

    #[test]
    fn test_dangling_open_tag_flagged() {
        let (tokens, _) = lex("<div><p>text");
        let (doc, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::BlockClosureMissing));
        // The tree still contains the implicitly-closed elements.
        assert!(!doc.children.is_empty());
    }

    #[test]
    fn test_mismatched_close_implicitly_closes() {
        let (tokens, _) = lex("<div><p>text</div>");
        let (doc, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::BlockClosureMissing));
        let div = first_element(&doc);
        assert_eq!(div.name, "div");
    }

    #[test]
    fn test_unmatched_close_reported_and_ignored() {
        let (tokens, _) = lex("<p>a</p></div>");
        let (doc, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.iter().any(|d| d.kind == DiagKind::Unexpected));
        assert_eq!(doc.children.len(), 1);
    }

    #[test]
    fn test_comment_preserved() {
        let doc = parse_ok("<div><!-- hello --></div>");
        let div = first_element(&doc);
        assert!(matches!(
            &div.children[0].kind,
            NodeKind::Comment(t) if t == " hello "
        ));
    }
}
