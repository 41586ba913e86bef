//! HTML front-end — lexer, parser, checks, and renderer placeholder.
//!
//! The lexer is a mode machine (CONTENT / AFTER-LT / AFTER-LT-SLASH /
//! IN-TAG / AFTER-ATTR-NAME / AFTER-ATTR-EQ); the parser builds a
//! document tree with void elements and implicit closure; the
//! "interpreter" is a renderer placeholder that pretty-prints the tree
//! and re-serializes raw HTML. No scripting, no CSS.

pub mod ast;
pub mod check;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod token;

pub use check::check;
pub use lexer::lex;
pub use parser::parse;
pub use render::{render, Rendering};
pub use token::{Token, TokenKind};

/// Elements that never take children and never need a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Check a (lowercased) tag name against the void set.
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}
