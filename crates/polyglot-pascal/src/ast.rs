//! Pascal AST for the supported subset.

use polyglot_lang_core::{AstNode, Span};

/// `program <name>; <decls> begin ... end.`
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl AstNode for Program {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// One `var` group: `a, b: integer;`
    VarGroup {
        names: Vec<String>,
        type_name: String,
    },
    /// One `const` entry: `max = 10;`
    ConstDef { name: String, value: Expr },
    Routine(Routine),
}

/// A procedure or function declaration (functions carry a return type).
#[derive(Debug, Clone)]
pub struct Routine {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Assign { target: String, value: Expr },
    /// Procedure statement (including `writeln(...)`).
    Call { name: String, args: Vec<Expr> },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    For {
        var: String,
        from: Expr,
        to: Expr,
        downto: bool,
        body: Box<Stmt>,
    },
    Repeat { body: Vec<Stmt>, until: Expr },
    Compound(Vec<Stmt>),
    Break,
    Continue,
    Empty,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Real(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    Call { name: String, args: Vec<Expr> },
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
    /// `/` — real division.
    Divide,
    /// `div` — integer division.
    IntDiv,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Divide => "/",
            BinOp::IntDiv => "div",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
        }
    }
}
