//! HTML document tree.

use polyglot_lang_core::{AstNode, Span};

#[derive(Debug, Clone)]
pub struct Document {
    pub children: Vec<Node>,
    pub span: Span,
}

impl AstNode for Document {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Doctype(String),
    Comment(String),
    /// Text run with original whitespace.
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in written order; `None` value means a bare name.
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<Node>,
    /// Written as `<.../>`.
    pub self_closed: bool,
}
