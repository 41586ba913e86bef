//! C++ token types.

use serde::{Deserialize, Serialize};

use polyglot_lang_core::Span;

/// A C++ token; `lexeme` is the exact source slice (for preprocessor
/// tokens, the whole line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// Whether an `#include` names a system or a user header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderKind {
    /// `#include <...>`
    System,
    /// `#include "..."`
    User,
}

/// Decoded payload of one preprocessor line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocPayload {
    /// Directive name without the `#`, e.g. `include`, `define`.
    pub directive: String,
    /// Header file for `#include`.
    pub header_file: Option<String>,
    pub header_kind: Option<HeaderKind>,
    /// Raw argument text for every other directive.
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// One whole preprocessor line.
    Preproc(PreprocPayload),

    // -- Literals --
    Int(i64),
    Float(f64),
    Str(String),
    CharLit(char),

    // -- Names and keywords --
    Ident(String),
    KwInt,
    KwFloat,
    KwDouble,
    KwChar,
    KwBool,
    KwVoid,
    KwAuto,
    KwConst,
    If,
    Else,
    While,
    For,
    Return,
    Break,
    Continue,
    Using,
    Namespace,
    Class,
    Struct,
    True,
    False,

    // -- Operators --
    Plus,
    Minus,
    Star,
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
    ColonColon,

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
            "int" => TokenKind::KwInt,
            "float" => TokenKind::KwFloat,
            "double" => TokenKind::KwDouble,
            "char" => TokenKind::KwChar,
            "bool" => TokenKind::KwBool,
            "void" => TokenKind::KwVoid,
            "auto" => TokenKind::KwAuto,
            "const" => TokenKind::KwConst,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "using" => TokenKind::Using,
            "namespace" => TokenKind::Namespace,
            "class" => TokenKind::Class,
            "struct" => TokenKind::Struct,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        })
    }

    /// Can this token begin a type?
    pub fn starts_type(&self) -> bool {
        matches!(
            self,
            TokenKind::KwInt
                | TokenKind::KwFloat
                | TokenKind::KwDouble
                | TokenKind::KwChar
                | TokenKind::KwBool
                | TokenKind::KwVoid
                | TokenKind::KwAuto
                | TokenKind::KwConst
        )
    }
}
