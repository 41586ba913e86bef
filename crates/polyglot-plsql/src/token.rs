//! PL/SQL token types.

use serde::{Deserialize, Serialize};

use polyglot_lang_core::Span;

/// A PL/SQL token; identifier payloads are folded to uppercase (the
/// dialect's rule for unquoted identifiers), lexemes keep the written
/// form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// Keyword-shaped names that the lexer reclassifies to identifiers so
/// the parser treats them as values (`SQLCODE`, `SYSDATE`, ...).
pub const IDENT_LIKE: &[&str] = &["SQLCODE", "SQLERRM", "SYSDATE", "USER", "UID", "ROWNUM"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // -- Literals --
    Int(i64),
    Float(f64),
    /// String literal (plain `'...'` or alternate `q'[...]'` form).
    Str(String),
    /// `DATE '...'` literal; the payload is the date text.
    DateLit(String),

    // -- Names and keywords (case-insensitive) --
    /// Identifier, folded to uppercase.
    Ident(String),
    Declare,
    Begin,
    End,
    Exception,
    When,
    Others,
    Then,
    If,
    Elsif,
    Else,
    Loop,
    Exit,
    While,
    For,
    In,
    Reverse,
    Raise,
    Null,
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    And,
    Or,
    Not,
    Is,
    Date,

    // -- Operators --
    Assign,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    /// `..` range operator; ordered before `.` in the rule table.
    DotDot,
    Dot,

    // -- Delimiters --
    LParen,
    RParen,
    Comma,
    Semicolon,

    Eof,
    Error(String),
}

impl TokenKind {
    /// Case-insensitive keyword lookup; `IDENT_LIKE` names stay
    /// identifiers by contract.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let upper = word.to_ascii_uppercase();
        if IDENT_LIKE.contains(&upper.as_str()) {
            return None;
        }
        Some(match upper.as_str() {
            "DECLARE" => TokenKind::Declare,
            "BEGIN" => TokenKind::Begin,
            "END" => TokenKind::End,
            "EXCEPTION" => TokenKind::Exception,
            "WHEN" => TokenKind::When,
            "OTHERS" => TokenKind::Others,
            "THEN" => TokenKind::Then,
            "IF" => TokenKind::If,
            "ELSIF" => TokenKind::Elsif,
            "ELSE" => TokenKind::Else,
            "LOOP" => TokenKind::Loop,
            "EXIT" => TokenKind::Exit,
            "WHILE" => TokenKind::While,
            "FOR" => TokenKind::For,
            "IN" => TokenKind::In,
            "REVERSE" => TokenKind::Reverse,
            "RAISE" => TokenKind::Raise,
            "NULL" => TokenKind::Null,
            "SELECT" => TokenKind::Select,
            "FROM" => TokenKind::From,
            "WHERE" => TokenKind::Where,
            "INSERT" => TokenKind::Insert,
            "INTO" => TokenKind::Into,
            "VALUES" => TokenKind::Values,
            "UPDATE" => TokenKind::Update,
            "SET" => TokenKind::Set,
            "DELETE" => TokenKind::Delete,
            "CREATE" => TokenKind::Create,
            "TABLE" => TokenKind::Table,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "IS" => TokenKind::Is,
            "DATE" => TokenKind::Date,
            _ => return None,
        })
    }
}
