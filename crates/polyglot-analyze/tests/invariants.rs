//! Universal pipeline invariants: termination, token-stream shape,
//! span containment, stdout truncation.

use polyglot_analyze::{analyze, AnalyzeOptions, LanguageTokens};
use polyglot_lang_core::Language;

const SAMPLES: &[(&str, Language)] = &[
    ("def f(x):\n    return x * 2\n\nprint(f(21))\n", Language::Python),
    ("let n = 2;\nconsole.log(n ** 5);\n", Language::JavaScript),
    (
        "#include <iostream>\nint main() { std::cout << 1 << std::endl; return 0; }\n",
        Language::Cpp,
    ),
    (
        "program p; var i: integer; begin for i := 1 to 3 do writeln(i); end.",
        Language::Pascal,
    ),
    (
        "BEGIN DBMS_OUTPUT.PUT_LINE('ok'); END;\n/",
        Language::PlSql,
    ),
    (
        "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\nSELECT * FROM t;\n",
        Language::TSql,
    ),
    ("<!DOCTYPE html><html><body>hi</body></html>", Language::Html),
];

fn forced(language: Language) -> AnalyzeOptions {
    AnalyzeOptions {
        forced_language: Some(language),
        ..Default::default()
    }
}

#[test]
fn every_token_stream_ends_in_exactly_one_eof() {
    for (source, language) in SAMPLES {
        let analysis = analyze(source, &forced(*language));
        let tokens = analysis.tokens.expect("tokens for a forced language");
        let spans = tokens.spans();
        assert!(!spans.is_empty(), "{language}: empty stream");
        let eof_count = match &tokens {
            LanguageTokens::Python(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_python::TokenKind::Eof))
                .count(),
            LanguageTokens::JavaScript(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_javascript::TokenKind::Eof))
                .count(),
            LanguageTokens::Cpp(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_cpp::TokenKind::Eof))
                .count(),
            LanguageTokens::Pascal(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_pascal::TokenKind::Eof))
                .count(),
            LanguageTokens::PlSql(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_plsql::TokenKind::Eof))
                .count(),
            LanguageTokens::TSql(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_tsql::TokenKind::Eof))
                .count(),
            LanguageTokens::Html(t) => t
                .iter()
                .filter(|t| matches!(t.kind, polyglot_html::TokenKind::Eof))
                .count(),
        };
        assert_eq!(eof_count, 1, "{language}: EOF count");
    }
}

#[test]
fn token_spans_never_overlap() {
    for (source, language) in SAMPLES {
        let analysis = analyze(source, &forced(*language));
        let spans = analysis.tokens.expect("tokens").spans();
        for pair in spans.windows(2) {
            assert!(
                pair[0].disjoint(&pair[1]) || pair[0].is_empty() || pair[1].is_empty(),
                "{language}: overlapping spans {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn token_and_ast_spans_stay_in_bounds() {
    for (source, language) in SAMPLES {
        let analysis = analyze(source, &forced(*language));
        let len = source.len() as u32;
        for span in analysis.tokens.expect("tokens").spans() {
            assert!(span.end() <= len, "{language}: token span out of bounds");
        }
        let root = analysis.ast.expect("ast").span();
        assert!(root.end() <= len, "{language}: root span out of bounds");
    }
}

#[test]
fn pathological_input_terminates() {
    // 50,000 bytes of one character: bounded lex time, no stack blowup.
    let big = "a".repeat(50_000);
    for language in [
        Language::Python,
        Language::JavaScript,
        Language::Cpp,
        Language::Pascal,
        Language::PlSql,
        Language::TSql,
        Language::Html,
    ] {
        let analysis = analyze(&big, &forced(language));
        assert!(analysis.tokens.is_some(), "{language}: no tokens");
    }
}

#[test]
fn stdout_is_a_prefix_under_runtime_error() {
    // The failing line truncates output; nothing is rewritten.
    let ok = analyze(
        "print('a')\nprint('b')\n",
        &forced(Language::Python),
    );
    let failing = analyze(
        "print('a')\nprint(1 / 0)\nprint('b')\n",
        &forced(Language::Python),
    );
    assert_eq!(ok.stdout, vec!["a", "b"]);
    assert_eq!(failing.stdout, vec!["a"]);
    assert!(ok.stdout.starts_with(&failing.stdout));
}

#[test]
fn classify_is_stable_per_input() {
    for (source, _) in SAMPLES {
        let first = analyze(source, &AnalyzeOptions::default());
        let second = analyze(source, &AnalyzeOptions::default());
        assert_eq!(
            first.classification.language,
            second.classification.language
        );
    }
}

#[test]
fn lexemes_rebuild_source_for_pascal() {
    // With whitespace/comment gaps reinserted, concatenated lexemes
    // reproduce the input bytes exactly.
    let source = "program t; begin writeln('x'); end.";
    let analysis = analyze(source, &forced(Language::Pascal));
    let tokens = analysis.tokens.expect("tokens");
    let LanguageTokens::Pascal(tokens) = tokens else {
        panic!("expected pascal tokens");
    };
    let mut rebuilt = String::new();
    let mut cursor = 0usize;
    for token in &tokens {
        let start = token.span.offset as usize;
        assert!(start >= cursor, "token goes backwards");
        rebuilt.push_str(&source[cursor..start]);
        rebuilt.push_str(&token.lexeme);
        cursor = token.span.end() as usize;
    }
    rebuilt.push_str(&source[cursor..]);
    assert_eq!(rebuilt, source);
}
