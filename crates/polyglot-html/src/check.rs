//! Static checks for HTML documents.
//!
//! The document tree has no names or scopes to resolve; the checks
//! here are structural: duplicate attributes and misplaced doctypes.

use polyglot_lang_core::{DiagKind, Diagnostic, Stage};

use crate::ast::{Document, Node, NodeKind};

/// Run all static checks over a document.
pub fn check(document: &Document) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for (index, node) in document.children.iter().enumerate() {
        if index > 0 {
            if let NodeKind::Doctype(_) = node.kind {
                diags.push(Diagnostic::warning(
                    Stage::Check,
                    DiagKind::UnreachableCode,
                    "doctype after the first node has no effect",
                    node.span,
                ));
            }
        }
        check_node(node, &mut diags);
    }
    diags
}

fn check_node(node: &Node, diags: &mut Vec<Diagnostic>) {
    if let NodeKind::Element(element) = &node.kind {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in &element.attrs {
            if !seen.insert(name.clone()) {
                diags.push(Diagnostic::warning(
                    Stage::Check,
                    DiagKind::Redeclaration,
                    format!("attribute '{name}' is repeated on '<{}>'", element.name),
                    node.span,
                ));
            }
        }
        for child in &element.children {
            check_node(child, diags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use polyglot_lang_core::AbortFlag;

    fn check_src(src: &str) -> Vec<Diagnostic> {
        let (tokens, _) = lex(src);
        let (doc, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        check(&doc)
    }

    #[test]
    fn test_clean_document() {
        assert!(check_src("<!DOCTYPE html><html><body></body></html>").is_empty());
    }

    #[test]
    fn test_duplicate_attribute() {
        let diags = check_src("<a id=\"x\" id=\"y\">t</a>");
        assert!(diags.iter().any(|d| d.kind == DiagKind::Redeclaration));
    }

    #[test]
    fn test_late_doctype() {
        let diags = check_src("<p>a</p><!DOCTYPE html>");
        assert!(!diags.is_empty());
    }
}
