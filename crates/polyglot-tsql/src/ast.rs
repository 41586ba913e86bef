//! T-SQL AST for the supported subset.
//!
//! A script is a sequence of batches separated by `GO`; `GO` itself
//! never reaches the statement list.

use polyglot_lang_core::{AstNode, Span};

#[derive(Debug, Clone)]
pub struct Script {
    pub batches: Vec<Batch>,
    pub span: Span,
}

impl AstNode for Script {
    fn span(&self) -> Span {
        self.span
    }
}

/// One run of statements between `GO` separators.
#[derive(Debug, Clone)]
pub struct Batch {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
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
    Print(Expr),
    Declare {
        name: String,
        type_text: String,
        init: Option<Expr>,
    },
    SetVar {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub type_text: String,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Projection {
    Star,
    Items(Vec<SelectItem>),
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    Column(String),
    /// `COUNT(*)` aggregate over the matching rows.
    CountStar,
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
    Null,
    /// Column reference (resolved against rows in WHERE context).
    Ident(String),
    /// `@name` local or `@@name` system variable.
    Var(String),
    /// `GETDATE()` and friends.
    FuncCall { name: String, args: Vec<Expr> },
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
    Mod,
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
            BinOp::Mod => "%",
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
