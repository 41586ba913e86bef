//! JavaScript token types.

use serde::{Deserialize, Serialize};

use polyglot_lang_core::Span;

/// A JavaScript token; `lexeme` is the exact source slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// One segment of a template literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    /// Literal text with escapes processed.
    Text(String),
    /// Raw source of a `${...}` interpolation, parsed later.
    Interp(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // -- Literals --
    Int(i64),
    Float(f64),
    Str(String),
    /// Backtick template literal, split into parts.
    Template(Vec<TemplatePart>),

    // -- Names and keywords --
    Ident(String),
    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Of,
    Break,
    Continue,
    New,
    Class,
    This,
    True,
    False,
    Null,
    Undefined,

    // -- Operators --
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    AndAnd,
    OrOr,
    Not,
    Amp,
    Pipe,
    Caret,
    Question,
    Colon,
    Arrow,

    // -- Delimiters --
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    Eof,
    Error(String),
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "of" => TokenKind::Of,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "new" => TokenKind::New,
            "class" => TokenKind::Class,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            _ => return None,
        })
    }
}
