//! PL/SQL AST for the supported subset.
//!
//! A script is a sequence of top-level items: SQL statements and
//! anonymous blocks (terminated by `;` and optionally the SQL*Plus
//! style `/` separator).

use polyglot_lang_core::{AstNode, Span};

#[derive(Debug, Clone)]
pub struct Script {
    pub items: Vec<Item>,
    pub span: Span,
}

impl AstNode for Script {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    Block(Block),
    Sql(SqlStmt),
}

/// `[DECLARE ...] BEGIN ... [EXCEPTION ...] END`
#[derive(Debug, Clone)]
pub struct Block {
    pub decls: Vec<VarDecl>,
    pub body: Vec<Stmt>,
    pub handlers: Vec<Handler>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    /// Declared type text (`NUMBER`, `VARCHAR2(20)`, `EXCEPTION`...).
    pub type_name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

impl VarDecl {
    pub fn is_exception(&self) -> bool {
        self.type_name.eq_ignore_ascii_case("EXCEPTION")
    }
}

/// One `WHEN name [OR name]* THEN ...` arm (`OTHERS` matches all).
#[derive(Debug, Clone)]
pub struct Handler {
    /// Empty means `WHEN OTHERS`.
    pub names: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Assign { target: String, value: Expr },
    /// Procedure-style call: `DBMS_OUTPUT.PUT_LINE(...)`,
    /// `RAISE_APPLICATION_ERROR(...)`.
    Call { name: Vec<String>, args: Vec<Expr> },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    /// Basic `LOOP ... END LOOP`.
    Loop { body: Vec<Stmt> },
    While { cond: Expr, body: Vec<Stmt> },
    ForRange {
        var: String,
        reverse: bool,
        lo: Expr,
        hi: Expr,
        body: Vec<Stmt>,
    },
    /// `EXIT [WHEN cond]`.
    Exit { when: Option<Expr> },
    /// `RAISE [name]` — bare RAISE re-raises in a handler.
    Raise { name: Option<String> },
    /// `SELECT cols INTO vars FROM t [WHERE ...]`.
    SelectInto {
        columns: Projection,
        into: Vec<String>,
        table: String,
        where_clause: Option<Expr>,
    },
    /// Nested anonymous block.
    Nested(Block),
    /// Plain SQL inside a block body.
    Sql(SqlStmt),
    NullStmt,
}

#[derive(Debug, Clone)]
pub enum SqlStmt {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Expr>>,
    },
    Select {
        columns: Projection,
        table: String,
        where_clause: Option<Expr>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        where_clause: Option<Expr>,
    },
    Delete {
        table: String,
        where_clause: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub type_text: String,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Projection {
    /// `SELECT *` — project in declared column order.
    Star,
    Columns(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    DateLit(String),
    Null,
    Ident(String),
    /// Builtin function call: `TO_CHAR(...)`, `NVL(...)`, `CHR(...)`.
    FuncCall { name: Vec<String>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Concat => "||",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}
