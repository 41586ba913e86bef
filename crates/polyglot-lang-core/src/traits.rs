//! Shared traits for the front-end pipelines.

use crate::span::Span;

/// Trait for AST nodes that carry source location information.
///
/// Every AST root implements this so generic tooling can access the
/// source span of any language's tree.
pub trait AstNode {
    /// Returns the source span covering this node, first token to last.
    fn span(&self) -> Span;
}
