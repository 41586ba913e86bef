//! Static checks for PL/SQL scripts.
//!
//! Block declarations feed a scope stack; SQL statements are checked
//! against the schemas declared by earlier `CREATE TABLE` items in the
//! same script.

use std::collections::{HashMap, HashSet};

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    Block, Expr, ExprKind, ItemKind, Projection, Script, SqlStmt, Stmt, StmtKind,
};

/// Builtin callables and value names.
pub const BUILTINS: &[&str] = &[
    "DBMS_OUTPUT.PUT_LINE",
    "TO_CHAR",
    "CHR",
    "NVL",
    "SYSDATE",
    "SQLERRM",
    "SQLCODE",
    "RAISE_APPLICATION_ERROR",
];

/// Run all static checks over a script.
pub fn check(script: &Script) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    for item in &script.items {
        match &item.kind {
            ItemKind::Block(block) => checker.check_block_item(block),
            ItemKind::Sql(sql) => checker.check_sql(sql, item.span),
        }
    }
    checker.diags
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingKind {
    Variable,
    ExceptionName,
}

struct Checker {
    scopes: Vec<HashMap<String, BindingKind>>,
    /// Table name -> column names, from CREATE TABLE items seen so far.
    schemas: HashMap<String, HashSet<String>>,
    loop_depth: usize,
    diags: Vec<Diagnostic>,
}

impl Checker {
    fn new() -> Self {
        Self {
            scopes: Vec::new(),
            schemas: HashMap::new(),
            loop_depth: 0,
            diags: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<BindingKind> {
        self.scopes.iter().rev().find_map(|s| s.get(name)).copied()
    }

    fn is_builtin_value(name: &str) -> bool {
        matches!(name, "SYSDATE" | "SQLERRM" | "SQLCODE" | "USER" | "UID" | "ROWNUM")
    }

    fn check_block_item(&mut self, block: &Block) {
        self.scopes.push(HashMap::new());
        for decl in &block.decls {
            if let Some(init) = &decl.init {
                self.check_expr(init, false);
            }
            let kind = if decl.is_exception() {
                BindingKind::ExceptionName
            } else {
                BindingKind::Variable
            };
            let replaced = self
                .scopes
                .last_mut()
                .expect("scope stack never empty")
                .insert(decl.name.clone(), kind);
            if replaced.is_some() {
                self.diags.push(Diagnostic::error(
                    Stage::Check,
                    DiagKind::Redeclaration,
                    format!("'{}' is already declared in this block", decl.name),
                    decl.span,
                ));
            }
        }
        self.check_stmts(&block.body);
        for handler in &block.handlers {
            for name in &handler.names {
                if self.lookup(name) != Some(BindingKind::ExceptionName)
                    && !is_predefined_exception(name)
                {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("exception '{name}' is not declared"),
                        handler.span,
                    ));
                }
            }
            self.check_stmts(&handler.body);
        }
        self.scopes.pop();
    }

    fn check_stmts(&mut self, body: &[Stmt]) {
        let mut terminated = false;
        for stmt in body {
            if terminated {
                self.diags.push(Diagnostic::warning(
                    Stage::Check,
                    DiagKind::UnreachableCode,
                    "statement is unreachable after RAISE",
                    stmt.span,
                ));
                terminated = false;
            }
            self.check_stmt(stmt);
            if matches!(stmt.kind, StmtKind::Raise { .. }) {
                terminated = true;
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                if self.lookup(target).is_none() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{target}' is not declared"),
                        stmt.span,
                    ));
                }
                self.check_expr(value, false);
            }
            StmtKind::Call { name, args } => {
                let joined = name.join(".");
                if !BUILTINS.contains(&joined.as_str()) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{joined}' is not a known procedure"),
                        stmt.span,
                    ));
                }
                for arg in args {
                    self.check_expr(arg, false);
                }
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    self.check_expr(cond, false);
                    self.check_stmts(body);
                }
                self.check_stmts(orelse);
            }
            StmtKind::Loop { body } => {
                self.loop_depth += 1;
                self.check_stmts(body);
                self.loop_depth -= 1;
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond, false);
                self.loop_depth += 1;
                self.check_stmts(body);
                self.loop_depth -= 1;
            }
            StmtKind::ForRange { var, lo, hi, body, .. } => {
                self.check_expr(lo, false);
                self.check_expr(hi, false);
                self.scopes.push(HashMap::new());
                self.scopes
                    .last_mut()
                    .expect("just pushed")
                    .insert(var.clone(), BindingKind::Variable);
                self.loop_depth += 1;
                self.check_stmts(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            StmtKind::Exit { when } => {
                if self.loop_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::BreakOutsideLoop,
                        "'EXIT' outside loop",
                        stmt.span,
                    ));
                }
                if let Some(when) = when {
                    self.check_expr(when, false);
                }
            }
            StmtKind::Raise { name } => match name {
                Some(name) => {
                    if self.lookup(name) != Some(BindingKind::ExceptionName)
                        && !is_predefined_exception(name)
                    {
                        self.diags.push(Diagnostic::error(
                            Stage::Check,
                            DiagKind::NameNotFound,
                            format!("exception '{name}' is not declared"),
                            stmt.span,
                        ));
                    }
                }
                // Bare RAISE re-raises the current error; whether one
                // exists is only known at run time.
                None => {}
            },
            StmtKind::SelectInto { columns, into, table, where_clause } => {
                self.check_projection(columns, table, stmt.span);
                for var in into {
                    if self.lookup(var).is_none() {
                        self.diags.push(Diagnostic::error(
                            Stage::Check,
                            DiagKind::NameNotFound,
                            format!("'{var}' is not declared"),
                            stmt.span,
                        ));
                    }
                }
                if let Some(where_clause) = where_clause {
                    self.check_where(where_clause, table);
                }
            }
            StmtKind::Nested(block) => self.check_block_item(block),
            StmtKind::Sql(sql) => self.check_sql(sql, stmt.span),
            StmtKind::NullStmt => {}
        }
    }

    fn check_sql(&mut self, sql: &SqlStmt, span: Span) {
        match sql {
            SqlStmt::CreateTable { table, columns } => {
                let cols = columns.iter().map(|c| c.name.clone()).collect();
                self.schemas.insert(table.clone(), cols);
            }
            SqlStmt::Insert { table, columns, rows } => {
                if let Some(known) = self.known_columns(table, span) {
                    if let Some(columns) = columns {
                        for column in columns {
                            if !known.contains(column) {
                                self.unknown_column(table, column, span);
                            }
                        }
                    }
                }
                for row in rows {
                    for value in row {
                        self.check_expr(value, true);
                    }
                }
            }
            SqlStmt::Select { columns, table, where_clause } => {
                self.check_projection(columns, table, span);
                if let Some(where_clause) = where_clause {
                    self.check_where(where_clause, table);
                }
            }
            SqlStmt::Update { table, assignments, where_clause } => {
                if let Some(known) = self.known_columns(table, span) {
                    for (column, _) in assignments {
                        if !known.contains(column) {
                            self.unknown_column(table, column, span);
                        }
                    }
                }
                for (_, value) in assignments {
                    self.check_expr(value, true);
                }
                if let Some(where_clause) = where_clause {
                    self.check_where(where_clause, table);
                }
            }
            SqlStmt::Delete { table, where_clause } => {
                let _ = self.known_columns(table, span);
                if let Some(where_clause) = where_clause {
                    self.check_where(where_clause, table);
                }
            }
        }
    }

    fn check_projection(&mut self, projection: &Projection, table: &str, span: Span) {
        if let Some(known) = self.known_columns(table, span) {
            if let Projection::Columns(columns) = projection {
                for column in columns {
                    if !known.contains(column) {
                        self.unknown_column(table, column, span);
                    }
                }
            }
        }
    }

    /// WHERE operands: bare identifiers may be columns of the table or
    /// declared variables.
    fn check_where(&mut self, expr: &Expr, table: &str) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let in_table = self
                    .schemas
                    .get(table)
                    .map_or(true, |cols| cols.contains(name));
                if !in_table && self.lookup(name).is_none() && !Self::is_builtin_value(name) {
                    self.unknown_column(table, name, expr.span);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.check_where(left, table);
                self.check_where(right, table);
            }
            ExprKind::Unary { operand, .. } => self.check_where(operand, table),
            ExprKind::FuncCall { args, .. } => {
                for arg in args {
                    self.check_where(arg, table);
                }
            }
            _ => {}
        }
    }

    fn known_columns(&mut self, table: &str, span: Span) -> Option<HashSet<String>> {
        match self.schemas.get(table) {
            Some(cols) => Some(cols.clone()),
            None => {
                self.diags.push(Diagnostic::error(
                    Stage::Check,
                    DiagKind::UnknownTable,
                    format!("table '{table}' is not created in this script"),
                    span,
                ));
                None
            }
        }
    }

    fn unknown_column(&mut self, table: &str, column: &str, span: Span) {
        self.diags.push(Diagnostic::error(
            Stage::Check,
            DiagKind::UnknownColumn,
            format!("column '{column}' does not exist in table '{table}'"),
            span,
        ));
    }

    /// `sql_context` skips name-resolution for bare identifiers, which
    /// resolve against rows at runtime.
    fn check_expr(&mut self, expr: &Expr, sql_context: bool) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if !sql_context && self.lookup(name).is_none() && !Self::is_builtin_value(name) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{name}' is not declared"),
                        expr.span,
                    ));
                }
            }
            ExprKind::FuncCall { name, args } => {
                let joined = name.join(".");
                if !BUILTINS.contains(&joined.as_str()) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{joined}' is not a known function"),
                        expr.span,
                    ));
                }
                for arg in args {
                    self.check_expr(arg, sql_context);
                }
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand, sql_context),
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left, sql_context);
                self.check_expr(right, sql_context);
            }
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::DateLit(_)
            | ExprKind::Null => {}
        }
    }
}

fn is_predefined_exception(name: &str) -> bool {
    matches!(
        name,
        "ZERO_DIVIDE" | "VALUE_ERROR" | "NO_DATA_FOUND" | "TOO_MANY_ROWS"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use polyglot_lang_core::AbortFlag;

    fn kinds(src: &str) -> Vec<DiagKind> {
        let (tokens, _) = lex(src);
        let (script, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        check(&script).into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_block() {
        assert!(kinds("BEGIN DBMS_OUTPUT.PUT_LINE('hi'); END;").is_empty());
    }

    #[test]
    fn test_undeclared_assignment() {
        assert!(kinds("BEGIN x := 1; END;").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_declared_assignment_ok() {
        assert!(kinds("DECLARE x NUMBER; BEGIN x := 1; END;").is_empty());
    }

    #[test]
    fn test_exit_outside_loop() {
        assert!(kinds("BEGIN EXIT; END;").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_undeclared_exception() {
        assert!(kinds("BEGIN RAISE nope; END;").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_predefined_exception_ok() {
        assert!(kinds("BEGIN RAISE ZERO_DIVIDE; EXCEPTION WHEN ZERO_DIVIDE THEN NULL; END;")
            .is_empty());
    }

    #[test]
    fn test_unknown_table() {
        assert!(kinds("BEGIN INSERT INTO ghost VALUES (1); END;").contains(&DiagKind::UnknownTable));
    }

    #[test]
    fn test_unknown_column() {
        let src = "CREATE TABLE t (id NUMBER);\nBEGIN UPDATE t SET nope = 1; END;";
        assert!(kinds(src).contains(&DiagKind::UnknownColumn));
    }

    #[test]
    fn test_where_column_resolution() {
        let src = "CREATE TABLE t (id NUMBER);\nSELECT id FROM t WHERE id > 1;";
        assert!(kinds(src).is_empty());
        let bad = "CREATE TABLE t (id NUMBER);\nSELECT id FROM t WHERE missing > 1;";
        assert!(kinds(bad).contains(&DiagKind::UnknownColumn));
    }

    #[test]
    fn test_sysdate_is_builtin_value() {
        assert!(kinds("DECLARE d VARCHAR2(30); BEGIN d := SYSDATE; END;").is_empty());
    }

    #[test]
    fn test_unreachable_after_raise() {
        let src = "DECLARE e EXCEPTION; BEGIN RAISE e; NULL; EXCEPTION WHEN e THEN NULL; END;";
        assert!(kinds(src).contains(&DiagKind::UnreachableCode));
    }
}
