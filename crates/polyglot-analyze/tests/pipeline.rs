//! End-to-end pipeline scenarios: literal inputs, expected stdout.

use pretty_assertions::assert_eq;

use polyglot_analyze::{analyze, AnalyzeOptions};
use polyglot_lang_core::Language;

fn run(source: &str) -> polyglot_analyze::Analysis {
    analyze(source, &AnalyzeOptions::default())
}

fn run_forced(source: &str, language: Language) -> polyglot_analyze::Analysis {
    analyze(
        source,
        &AnalyzeOptions {
            forced_language: Some(language),
            ..Default::default()
        },
    )
}

fn assert_clean(analysis: &polyglot_analyze::Analysis) {
    assert!(
        analysis.diagnostics.iter().all(|d| !d.is_error()),
        "diagnostics: {:?}",
        analysis.diagnostics
    );
}

#[test]
fn python_function_scenario() {
    let analysis = run("def add(a,b):\n    return a+b\n\nprint(add(2,3))\n");
    assert_eq!(analysis.classification.language, Language::Python);
    assert_clean(&analysis);
    assert_eq!(analysis.stdout, vec!["5"]);
}

#[test]
fn javascript_for_loop_scenario() {
    let analysis = run("let t = 0;\nfor (let i=1; i<=4; i++) t += i;\nconsole.log(t);\n");
    assert_eq!(analysis.classification.language, Language::JavaScript);
    assert_clean(&analysis);
    assert_eq!(analysis.stdout, vec!["10"]);
}

#[test]
fn pascal_writeln_scenario() {
    let analysis = run("program t; var x:integer; begin x := 7; writeln('x=', x); end.");
    assert_eq!(analysis.classification.language, Language::Pascal);
    assert_clean(&analysis);
    assert_eq!(analysis.stdout, vec!["x=7"]);
}

#[test]
fn tsql_table_scenario() {
    let analysis = run(
        "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nSELECT * FROM p WHERE id > 1;\n",
    );
    assert_eq!(analysis.classification.language, Language::TSql);
    assert_clean(&analysis);
    assert_eq!(
        analysis.stdout,
        vec![
            "id | nm".to_string(),
            "-- | --".to_string(),
            "2  | b".to_string(),
            "(1 row affected)".to_string(),
        ]
    );
}

#[test]
fn plsql_put_line_scenario() {
    let analysis = run("BEGIN DBMS_OUTPUT.PUT_LINE('n=' || (2+3*4)); END;\n/");
    assert_eq!(analysis.classification.language, Language::PlSql);
    assert_clean(&analysis);
    assert_eq!(analysis.stdout, vec!["n=14"]);
}

#[test]
fn html_classifier_scenario() {
    let analysis = run("<!DOCTYPE html><html><body><p>hi</p></body></html>");
    assert_eq!(analysis.classification.language, Language::Html);
    assert!(
        analysis.classification.confidence >= 70.0,
        "confidence {}",
        analysis.classification.confidence
    );
    assert_clean(&analysis);
    // Renderer placeholder output: tree lines then the raw chunk.
    assert!(analysis.stdout.iter().any(|l| l.contains("#text \"hi\"")));
    assert!(analysis
        .stdout
        .last()
        .is_some_and(|raw| raw.contains("<p>hi</p>")));
}

#[test]
fn cpp_cout_end_to_end() {
    let analysis = run_forced(
        "#include <iostream>\nusing namespace std;\nint main() {\n    cout << \"x=\" << 7 << endl;\n    return 0;\n}\n",
        Language::Cpp,
    );
    assert_clean(&analysis);
    assert_eq!(analysis.stdout, vec!["x=7"]);
}

#[test]
fn cpp_classifies_without_forcing() {
    let analysis = run(
        "#include <iostream>\nusing namespace std;\nint main() {\n    std::cout << 42 << std::endl;\n    return 0;\n}\n",
    );
    assert_eq!(analysis.classification.language, Language::Cpp);
    assert_eq!(analysis.stdout, vec!["42"]);
}
