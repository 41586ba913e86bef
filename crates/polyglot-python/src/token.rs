//! Python token types.

use serde::{Deserialize, Serialize};

use polyglot_lang_core::Span;

/// A Python token. `lexeme` is the exact source slice; synthetic
/// tokens (`Indent`, `Dedent`, trailing `Newline`, `Eof`) carry an
/// empty lexeme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// Python token kinds. Literal kinds carry their decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // -- Literals --
    Int(i64),
    Float(f64),
    /// String literal with escapes already processed.
    Str(String),

    // -- Names and keywords --
    Ident(String),
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Pass,
    Not,
    And,
    Or,
    Assert,
    True,
    False,
    None,

    // -- Operators --
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,

    // -- Delimiters --
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,

    // -- Layout --
    /// End of a logical line.
    Newline,
    /// Indentation increased past the stack top.
    Indent,
    /// Indentation popped one stack entry.
    Dedent,
    Eof,

    /// Unrecognized input; the lexer emitted a diagnostic and moved on.
    Error(String),
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped lexeme.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "pass" => TokenKind::Pass,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "assert" => TokenKind::Assert,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => return Option::None,
        })
    }
}
