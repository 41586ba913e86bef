//! The cue catalog, kept as data.
//!
//! Cues live in `cues.json` next to this file and are deserialized
//! once at first use. Each cue is a regex applied once to the sample;
//! a match adds its per-language deltas to the score accumulator.
//! Catalog order is the classifier's tie-break order, so the file
//! order is part of the contract.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use polyglot_lang_core::Language;

/// One catalog entry as stored in `cues.json`.
#[derive(Debug, Deserialize)]
pub struct CueSpec {
    /// Short stable name, reported in `activated_cues`.
    pub name: String,
    /// Regex source; `(?i)` and friends inline as needed.
    pub pattern: String,
    /// Language → score delta (positive or negative).
    pub scores: HashMap<Language, f64>,
}

/// A compiled cue.
pub struct Cue {
    pub name: String,
    pub regex: Regex,
    pub scores: HashMap<Language, f64>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    cues: Vec<CueSpec>,
}

/// The compiled catalog, built once.
pub static CATALOG: Lazy<Vec<Cue>> = Lazy::new(|| {
    let file: CatalogFile =
        serde_json::from_str(include_str!("cues.json")).expect("embedded cue catalog is valid");
    file.cues
        .into_iter()
        .map(|spec| Cue {
            regex: Regex::new(&spec.pattern).expect("embedded cue pattern compiles"),
            name: spec.name,
            scores: spec.scores,
        })
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads_and_compiles() {
        assert!(CATALOG.len() > 20, "catalog should carry a real cue set");
    }

    #[test]
    fn test_cue_names_unique() {
        let mut seen = std::collections::HashSet::new();
        for cue in CATALOG.iter() {
            assert!(seen.insert(cue.name.clone()), "duplicate cue {}", cue.name);
        }
    }

    #[test]
    fn test_no_cue_scores_unknown() {
        for cue in CATALOG.iter() {
            assert!(
                !cue.scores.contains_key(&Language::Unknown),
                "cue {} scores Unknown",
                cue.name
            );
        }
    }
}
