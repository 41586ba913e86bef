//! HTML token types.

use serde::{Deserialize, Serialize};

use polyglot_lang_core::Span;

/// An HTML token. Name payloads are case-folded to lowercase for
/// matching; `lexeme` preserves the original casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// How an attribute value was quoted in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStyle {
    Double,
    Single,
    Unquoted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// `<!DOCTYPE ...>`; payload is the declaration body.
    Doctype(String),
    /// `<!-- ... -->`; payload is the comment text.
    Comment(String),
    /// `<` opening a start tag.
    TagOpen,
    /// `</` opening an end tag.
    TagClose,
    /// `>` ending a tag.
    TagEnd,
    /// `/>` ending a self-closing tag.
    SelfClose,
    /// Tag name, lowercased.
    TagName(String),
    /// Attribute name, lowercased.
    AttrName(String),
    /// `=` between attribute name and value.
    Equals,
    /// Attribute value with quotes stripped.
    AttrValue(String, QuoteStyle),
    /// Text content between tags (whitespace preserved).
    Text(String),
    /// Whitespace inside a tag.
    Whitespace,
    Eof,
    Error(String),
}
