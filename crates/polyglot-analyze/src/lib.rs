//! The analysis orchestrator.
//!
//! [`analyze`] drives the full pipeline for one source fragment:
//! classify → lex → parse → check → interpret (render for HTML).
//! Diagnostics accumulate in stage order; captured stdout is whatever
//! the language's print builtins emitted before completion or abort.
//!
//! Data flow is strictly linear per request and single-threaded; one
//! [`analyze`] call owns its source buffer, token stream, AST, and
//! interpreter state.

use polyglot_classify::{classify, Classification};
use polyglot_lang_core::{AbortFlag, Diagnostic, Language, SourceBuffer};

/// Options for one analysis request.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Skip the classifier and force this front-end.
    pub forced_language: Option<Language>,
    /// Checked between parser items and interpreter statements.
    pub abort: AbortFlag,
}

/// Per-language token streams, strongly typed.
#[derive(Debug)]
pub enum LanguageTokens {
    Python(Vec<polyglot_python::Token>),
    JavaScript(Vec<polyglot_javascript::Token>),
    Cpp(Vec<polyglot_cpp::Token>),
    Pascal(Vec<polyglot_pascal::Token>),
    PlSql(Vec<polyglot_plsql::Token>),
    TSql(Vec<polyglot_tsql::Token>),
    Html(Vec<polyglot_html::Token>),
}

impl LanguageTokens {
    /// Number of tokens in the stream (EOF included).
    pub fn len(&self) -> usize {
        match self {
            LanguageTokens::Python(t) => t.len(),
            LanguageTokens::JavaScript(t) => t.len(),
            LanguageTokens::Cpp(t) => t.len(),
            LanguageTokens::Pascal(t) => t.len(),
            LanguageTokens::PlSql(t) => t.len(),
            LanguageTokens::TSql(t) => t.len(),
            LanguageTokens::Html(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spans in stream order, for invariant checks and highlighting.
    pub fn spans(&self) -> Vec<polyglot_lang_core::Span> {
        match self {
            LanguageTokens::Python(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::JavaScript(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::Cpp(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::Pascal(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::PlSql(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::TSql(t) => t.iter().map(|t| t.span).collect(),
            LanguageTokens::Html(t) => t.iter().map(|t| t.span).collect(),
        }
    }
}

/// Per-language AST roots, strongly typed.
#[derive(Debug)]
pub enum LanguageAst {
    Python(polyglot_python::ast::Module),
    JavaScript(polyglot_javascript::ast::Program),
    Cpp(polyglot_cpp::ast::TranslationUnit),
    Pascal(polyglot_pascal::ast::Program),
    PlSql(polyglot_plsql::ast::Script),
    TSql(polyglot_tsql::ast::Script),
    Html(polyglot_html::ast::Document),
}

impl LanguageAst {
    /// The root span, first token to last.
    pub fn span(&self) -> polyglot_lang_core::Span {
        use polyglot_lang_core::AstNode;
        match self {
            LanguageAst::Python(ast) => ast.span(),
            LanguageAst::JavaScript(ast) => ast.span(),
            LanguageAst::Cpp(ast) => ast.span(),
            LanguageAst::Pascal(ast) => ast.span(),
            LanguageAst::PlSql(ast) => ast.span(),
            LanguageAst::TSql(ast) => ast.span(),
            LanguageAst::Html(ast) => ast.span(),
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct Analysis {
    pub classification: Classification,
    pub tokens: Option<LanguageTokens>,
    pub ast: Option<LanguageAst>,
    /// Stage-ordered: classify, lex, parse, check, run.
    pub diagnostics: Vec<Diagnostic>,
    /// Newline-terminated chunks in emission order (terminators
    /// stripped). For HTML this is the pretty-print plus the raw
    /// serialization as a final chunk.
    pub stdout: Vec<String>,
}

/// Run the full pipeline over one source fragment.
pub fn analyze(source: &str, options: &AnalyzeOptions) -> Analysis {
    let buffer = SourceBuffer::new(source);
    let text = buffer.text();

    let classification = match options.forced_language {
        Some(language) if language != Language::Unknown => forced(language),
        _ => classify(text),
    };

    let mut diagnostics = Vec::new();
    if classification.language == Language::Unknown {
        if let Some(note) = &classification.note {
            // Empty input yields empty outputs with zero diagnostics.
            if note != "empty input" {
                diagnostics.push(Diagnostic::warning(
                    polyglot_lang_core::Stage::Classify,
                    polyglot_lang_core::DiagKind::LowConfidence,
                    format!("could not classify input ({note})"),
                    polyglot_lang_core::Span::dummy(),
                ));
            }
        }
        return Analysis {
            classification,
            tokens: None,
            ast: None,
            diagnostics,
            stdout: Vec::new(),
        };
    }

    let abort = &options.abort;
    let (tokens, ast, stdout) = match classification.language {
        Language::Python => {
            let (tokens, lex_diags) = polyglot_python::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_python::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_python::check(&ast));
            let run = polyglot_python::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::Python(tokens),
                LanguageAst::Python(ast),
                run.stdout,
            )
        }
        Language::JavaScript => {
            let (tokens, lex_diags) = polyglot_javascript::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_javascript::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_javascript::check(&ast));
            let run = polyglot_javascript::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::JavaScript(tokens),
                LanguageAst::JavaScript(ast),
                run.stdout,
            )
        }
        Language::Cpp => {
            let (tokens, lex_diags) = polyglot_cpp::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_cpp::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_cpp::check(&ast));
            let run = polyglot_cpp::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::Cpp(tokens),
                LanguageAst::Cpp(ast),
                run.stdout,
            )
        }
        Language::Pascal => {
            let (tokens, lex_diags) = polyglot_pascal::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_pascal::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_pascal::check(&ast));
            let run = polyglot_pascal::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::Pascal(tokens),
                LanguageAst::Pascal(ast),
                run.stdout,
            )
        }
        Language::PlSql => {
            let (tokens, lex_diags) = polyglot_plsql::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_plsql::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_plsql::check(&ast));
            let run = polyglot_plsql::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::PlSql(tokens),
                LanguageAst::PlSql(ast),
                run.stdout,
            )
        }
        Language::TSql => {
            let (tokens, lex_diags) = polyglot_tsql::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_tsql::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_tsql::check(&ast));
            let run = polyglot_tsql::interpret(&ast, abort);
            diagnostics.extend(run.diagnostics);
            (
                LanguageTokens::TSql(tokens),
                LanguageAst::TSql(ast),
                run.stdout,
            )
        }
        Language::Html => {
            let (tokens, lex_diags) = polyglot_html::lex(text);
            diagnostics.extend(lex_diags);
            let (ast, parse_diags) = polyglot_html::parse(&tokens, abort);
            diagnostics.extend(parse_diags);
            diagnostics.extend(polyglot_html::check(&ast));
            let rendering = polyglot_html::render(&ast);
            let mut stdout = rendering.pretty;
            if !rendering.raw.is_empty() {
                stdout.push(rendering.raw);
            }
            (
                LanguageTokens::Html(tokens),
                LanguageAst::Html(ast),
                stdout,
            )
        }
        Language::Unknown => unreachable!("handled above"),
    };

    Analysis {
        classification,
        tokens: Some(tokens),
        ast: Some(ast),
        diagnostics,
        stdout,
    }
}

/// The classification record used when the caller forces a language.
fn forced(language: Language) -> Classification {
    Classification {
        language,
        confidence: 100.0,
        scores: Language::ALL
            .iter()
            .map(|&l| (l, if l == language { 100.0 } else { 0.0 }))
            .collect(),
        activated_cues: Vec::new(),
        note: Some("forced by caller".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_language_bypasses_classifier() {
        // This text would classify as Python; forcing JS runs the JS
        // front-end instead.
        let options = AnalyzeOptions {
            forced_language: Some(Language::JavaScript),
            ..Default::default()
        };
        let analysis = analyze("console.log(1);", &options);
        assert_eq!(analysis.classification.language, Language::JavaScript);
        assert_eq!(analysis.stdout, vec!["1"]);
    }

    #[test]
    fn test_empty_input_zero_diagnostics() {
        let analysis = analyze("", &AnalyzeOptions::default());
        assert_eq!(analysis.classification.language, Language::Unknown);
        assert!(analysis.tokens.is_none());
        assert!(analysis.ast.is_none());
        assert!(analysis.diagnostics.is_empty());
        assert!(analysis.stdout.is_empty());
    }

    #[test]
    fn test_unknown_text_gets_low_confidence_diagnostic() {
        let analysis = analyze("zzz qqq www\neee rrr ttt\n", &AnalyzeOptions::default());
        assert_eq!(analysis.classification.language, Language::Unknown);
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(
            analysis.diagnostics[0].kind,
            polyglot_lang_core::DiagKind::LowConfidence
        );
    }

    #[test]
    fn test_abort_before_run() {
        let options = AnalyzeOptions {
            forced_language: Some(Language::Python),
            abort: AbortFlag::new(),
        };
        options.abort.set();
        let analysis = analyze("print(1)\n", &options);
        assert!(analysis
            .diagnostics
            .iter()
            .any(|d| d.kind == polyglot_lang_core::DiagKind::Cancelled));
        assert!(analysis.stdout.is_empty());
    }
}
