//! The closed set of supported source languages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A supported source language, or `Unknown` when classification fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    JavaScript,
    Cpp,
    Pascal,
    PlSql,
    TSql,
    Html,
    Unknown,
}

impl Language {
    /// All concrete languages, in classifier tie-break order.
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::JavaScript,
        Language::Cpp,
        Language::Pascal,
        Language::PlSql,
        Language::TSql,
        Language::Html,
    ];

    /// Stable display tag (`PLSQL`, `TSQL` for the SQL dialects).
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::Cpp => "C++",
            Language::Pascal => "Pascal",
            Language::PlSql => "PLSQL",
            Language::TSql => "TSQL",
            Language::Html => "HTML",
            Language::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_excludes_unknown() {
        assert_eq!(Language::ALL.len(), 7);
        assert!(!Language::ALL.contains(&Language::Unknown));
    }

    #[test]
    fn test_tags() {
        assert_eq!(Language::PlSql.tag(), "PLSQL");
        assert_eq!(Language::Cpp.to_string(), "C++");
    }
}
