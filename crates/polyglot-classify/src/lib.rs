//! Language classifier — scored pattern voting over a cue catalog.
//!
//! Classification never raises: every input yields a [`Classification`],
//! with `Unknown` covering empty input, a silent catalog, and
//! low-confidence winners. The cue catalog itself is data
//! (`cues.json`), loaded once at first use; see [`catalog`].

mod catalog;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use polyglot_lang_core::Language;

pub use catalog::{Cue, CueSpec, CATALOG};

/// A winner must reach this absolute score, or the result is Unknown.
pub const MIN_WINNER_SCORE: f64 = 35.0;
/// ... and this share of the total score, in percent.
pub const MIN_CONFIDENCE_PCT: f64 = 30.0;
/// The sample is the first this-many non-blank lines.
pub const SAMPLE_LINES: usize = 20;

/// Classifier verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Best guess, or `Unknown`.
    pub language: Language,
    /// Winner's share of the total score, 0–100.
    pub confidence: f64,
    /// Clamped per-language scores, in catalog language order.
    pub scores: Vec<(Language, f64)>,
    /// Names of the cues that matched, in catalog order.
    pub activated_cues: Vec<String>,
    /// Human-readable note for the Unknown cases.
    pub note: Option<String>,
}

/// Classify a source fragment.
pub fn classify(text: &str) -> Classification {
    if text.trim().is_empty() {
        return unknown("empty input");
    }

    let sample = head_sample(text);
    let mut scores: HashMap<Language, f64> = HashMap::new();
    let mut activated = Vec::new();

    for cue in CATALOG.iter() {
        if cue.regex.is_match(&sample) {
            activated.push(cue.name.clone());
            for (lang, delta) in &cue.scores {
                *scores.entry(*lang).or_insert(0.0) += delta;
            }
        }
    }

    apply_refinements(text, &sample, &mut scores);

    // Clamp before ranking; the score vector must never go negative
    // (or NaN) into the confidence arithmetic.
    let ranked: Vec<(Language, f64)> = Language::ALL
        .iter()
        .map(|&lang| (lang, scores.get(&lang).copied().unwrap_or(0.0).max(0.0)))
        .collect();

    let total: f64 = ranked.iter().map(|(_, s)| s).sum();
    if total == 0.0 {
        return Classification {
            activated_cues: activated,
            ..unknown("no cues")
        };
    }

    // Stable argmax: earlier catalog order wins ties.
    let (winner, winner_score) = ranked
        .iter()
        .copied()
        .fold(None, |best: Option<(Language, f64)>, cur| match best {
            Some((_, s)) if s >= cur.1 => best,
            _ => Some(cur),
        })
        .expect("ranked is non-empty");

    let confidence = winner_score / total * 100.0;
    if winner_score < MIN_WINNER_SCORE || confidence < MIN_CONFIDENCE_PCT {
        return Classification {
            language: Language::Unknown,
            confidence,
            scores: ranked,
            activated_cues: activated,
            note: Some(format!(
                "low confidence: {}? {:.0}pts, {:.0}%",
                winner.tag(),
                winner_score,
                confidence
            )),
        };
    }

    Classification {
        language: winner,
        confidence,
        scores: ranked,
        activated_cues: activated,
        note: None,
    }
}

fn unknown(note: &str) -> Classification {
    Classification {
        language: Language::Unknown,
        confidence: 0.0,
        scores: Language::ALL.iter().map(|&l| (l, 0.0)).collect(),
        activated_cues: Vec::new(),
        note: Some(note.to_string()),
    }
}

/// First `SAMPLE_LINES` non-blank lines, rejoined.
fn head_sample(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Global stylistic refinements
// ---------------------------------------------------------------------------

const SEMI_HEAVY_BOOST: f64 = 15.0;
const SEMI_HEAVY_PENALTY: f64 = 25.0;
const SEMI_LIGHT_BOOST: f64 = 12.0;
const SEMI_LIGHT_PENALTY: f64 = 5.0;
const BRACE_PAIR_BOOST: f64 = 4.0;
const BRACE_PAIR_PENALTY: f64 = 3.0;
const BRACE_PAIR_CAP: u32 = 5;

const SEMI_GROUP: [Language; 5] = [
    Language::Cpp,
    Language::JavaScript,
    Language::PlSql,
    Language::TSql,
    Language::Pascal,
];

static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(//|#|--|<!--|\{|\(\*|/\*)").expect("comment prefix regex"));

fn apply_refinements(text: &str, sample: &str, scores: &mut HashMap<Language, f64>) {
    let meaningful: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !LINE_COMMENT.is_match(l))
        .collect();

    if !meaningful.is_empty() {
        let semi = meaningful.iter().filter(|l| l.ends_with(';')).count();
        let ratio = semi as f64 / meaningful.len() as f64;
        if ratio > 0.6 {
            for lang in SEMI_GROUP {
                *scores.entry(lang).or_insert(0.0) += SEMI_HEAVY_BOOST;
            }
            *scores.entry(Language::Python).or_insert(0.0) -= SEMI_HEAVY_PENALTY;
            *scores.entry(Language::Html).or_insert(0.0) -= SEMI_HEAVY_PENALTY;
        } else if ratio < 0.1 && meaningful.len() >= 3 {
            *scores.entry(Language::Python).or_insert(0.0) += SEMI_LIGHT_BOOST;
            *scores.entry(Language::Html).or_insert(0.0) += SEMI_LIGHT_BOOST;
            for lang in SEMI_GROUP {
                *scores.entry(lang).or_insert(0.0) -= SEMI_LIGHT_PENALTY;
            }
        }
    }

    let opens = sample.matches('{').count() as u32;
    let closes = sample.matches('}').count() as u32;
    if opens > 0 && opens == closes {
        let pairs = opens.min(BRACE_PAIR_CAP) as f64;
        *scores.entry(Language::Cpp).or_insert(0.0) += pairs * BRACE_PAIR_BOOST;
        *scores.entry(Language::JavaScript).or_insert(0.0) += pairs * BRACE_PAIR_BOOST;
        for lang in [Language::Python, Language::Pascal, Language::Html] {
            *scores.entry(lang).or_insert(0.0) -= pairs * BRACE_PAIR_PENALTY;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn winner(text: &str) -> Language {
        classify(text).language
    }

    #[test]
    fn test_empty_input() {
        let result = classify("   \n\t\n");
        assert_eq!(result.language, Language::Unknown);
        assert_eq!(result.note.as_deref(), Some("empty input"));
    }

    #[test]
    fn test_no_cues() {
        let result = classify("zzz qqq\nwww eee\n");
        assert_eq!(result.language, Language::Unknown);
        assert_eq!(result.note.as_deref(), Some("no cues"));
    }

    #[test]
    fn test_python_calibration() {
        let src = "def add(a,b):\n    return a+b\n\nprint(add(2,3))\n";
        assert_eq!(winner(src), Language::Python);
    }

    #[test]
    fn test_javascript_calibration() {
        let src = "let t = 0;\nfor (let i=1; i<=4; i++) t += i;\nconsole.log(t);\n";
        assert_eq!(winner(src), Language::JavaScript);
    }

    #[test]
    fn test_pascal_calibration() {
        let src = "program t; var x:integer; begin x := 7; writeln('x=', x); end.";
        assert_eq!(winner(src), Language::Pascal);
    }

    #[test]
    fn test_tsql_calibration() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nSELECT * FROM p WHERE id > 1;\n";
        assert_eq!(winner(src), Language::TSql);
    }

    #[test]
    fn test_plsql_calibration() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE('n=' || (2+3*4)); END;\n/";
        assert_eq!(winner(src), Language::PlSql);
    }

    #[test]
    fn test_html_calibration_confidence() {
        let result = classify("<!DOCTYPE html><html><body><p>hi</p></body></html>");
        assert_eq!(result.language, Language::Html);
        assert!(result.confidence >= 70.0, "confidence {}", result.confidence);
    }

    #[test]
    fn test_cpp_detection() {
        let src = "#include <iostream>\nusing namespace std;\nint main() {\n    std::cout << 1;\n    return 0;\n}\n";
        assert_eq!(winner(src), Language::Cpp);
    }

    #[test]
    fn test_stability_on_same_input() {
        let src = "def f():\n    print(1)\n    return 2\n";
        let first = classify(src);
        let second = classify(src);
        assert_eq!(first.language, second.language);
        assert_eq!(first.scores, second.scores);
    }

    #[test]
    fn test_scores_clamped_non_negative() {
        // Heavy semicolon text should clamp Python/HTML to 0, not negative.
        let src = "a = 1;\nb = 2;\nc = 3;\nd = 4;\n";
        let result = classify(src);
        for (_, score) in &result.scores {
            assert!(*score >= 0.0);
            assert!(score.is_finite());
        }
    }

    #[test]
    fn test_low_confidence_note_shape() {
        // A single weak SQL-ish cue lands below the absolute threshold.
        let result = classify("INSERT INTO t VALUES (1)");
        assert_eq!(result.language, Language::Unknown);
        let note = result.note.expect("low-confidence note");
        assert!(note.starts_with("low confidence:"), "note: {note}");
    }

    #[test]
    fn test_activated_cues_reported_in_catalog_order() {
        let result = classify("<!DOCTYPE html><html></html>");
        let names = &result.activated_cues;
        assert!(names.contains(&"html-doctype".to_string()));
        let doctype_idx = names.iter().position(|n| n == "html-doctype").unwrap();
        let close_idx = names.iter().position(|n| n == "html-close-tag");
        if let Some(close_idx) = close_idx {
            assert!(doctype_idx < close_idx);
        }
    }
}
