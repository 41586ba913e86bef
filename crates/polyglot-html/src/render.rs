//! Renderer placeholder — the HTML pipeline's "interpreter".
//!
//! Walks the document tree and produces a textual pretty-print plus a
//! raw HTML string for a previewer. No scripting, no CSS.

use crate::ast::{Document, Element, Node, NodeKind};

/// Render output: indented tree lines plus re-serialized HTML.
#[derive(Debug, Clone)]
pub struct Rendering {
    /// One line per tree node, indented two spaces per depth.
    pub pretty: Vec<String>,
    /// Raw HTML suitable for a previewer.
    pub raw: String,
}

/// Render a parsed document.
pub fn render(document: &Document) -> Rendering {
    let mut pretty = Vec::new();
    let mut raw = String::new();
    for node in &document.children {
        render_node(node, 0, &mut pretty, &mut raw);
    }
    Rendering { pretty, raw }
}

fn render_node(node: &Node, depth: usize, pretty: &mut Vec<String>, raw: &mut String) {
    let indent = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Doctype(body) => {
            pretty.push(format!("{indent}#doctype {}", body.trim()));
            raw.push_str(&format!("<!{body}>"));
        }
        NodeKind::Comment(text) => {
            pretty.push(format!("{indent}#comment {}", text.trim()));
            raw.push_str(&format!("<!--{text}-->"));
        }
        NodeKind::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                pretty.push(format!("{indent}#text \"{trimmed}\""));
            }
            raw.push_str(text);
        }
        NodeKind::Element(element) => {
            pretty.push(format!("{indent}{}", describe(element)));
            raw.push_str(&open_tag(element));
            for child in &element.children {
                render_node(child, depth + 1, pretty, raw);
            }
            if !element.self_closed && !crate::is_void_element(&element.name) {
                raw.push_str(&format!("</{}>", element.name));
            }
        }
    }
}

fn describe(element: &Element) -> String {
    let mut s = format!("<{}>", element.name);
    if !element.attrs.is_empty() {
        let attrs: Vec<String> = element
            .attrs
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("{name}={value}"),
                None => name.clone(),
            })
            .collect();
        s.push_str(&format!(" [{}]", attrs.join(" ")));
    }
    s
}

fn open_tag(element: &Element) -> String {
    let mut s = format!("<{}", element.name);
    for (name, value) in &element.attrs {
        match value {
            Some(value) => s.push_str(&format!(" {name}=\"{value}\"")),
            None => s.push_str(&format!(" {name}")),
        }
    }
    if element.self_closed {
        s.push_str("/>");
    } else {
        s.push('>');
    }
    s
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use polyglot_lang_core::AbortFlag;

    fn render_src(src: &str) -> Rendering {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (doc, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        render(&doc)
    }

    #[test]
    fn test_pretty_print_indentation() {
        let out = render_src("<html><body><p>hi</p></body></html>");
        assert_eq!(
            out.pretty,
            vec![
                "<html>".to_string(),
                "  <body>".to_string(),
                "    <p>".to_string(),
                "      #text \"hi\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_raw_round_trips_structure() {
        let out = render_src("<div id=\"a\"><br><p>x</p></div>");
        assert_eq!(out.raw, "<div id=\"a\"><br><p>x</p></div>");
    }

    #[test]
    fn test_doctype_and_comment() {
        let out = render_src("<!DOCTYPE html><!-- note --><p>t</p>");
        assert_eq!(out.pretty[0], "#doctype DOCTYPE html");
        assert_eq!(out.pretty[1], "#comment note");
        assert!(out.raw.starts_with("<!DOCTYPE html>"));
        assert!(out.raw.contains("<!-- note -->"));
    }

    #[test]
    fn test_attrs_in_pretty() {
        let out = render_src("<a href=\"x\" disabled>t</a>");
        assert_eq!(out.pretty[0], "<a> [href=x disabled]");
    }

    #[test]
    fn test_self_closed_raw() {
        let out = render_src("<img src=\"i.png\"/>");
        assert_eq!(out.raw, "<img src=\"i.png\"/>");
    }
}
