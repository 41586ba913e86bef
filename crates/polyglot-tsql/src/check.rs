//! Static checks for T-SQL scripts.
//!
//! `@` variables must be declared before use; column references are
//! checked against schemas created earlier in the script. Variables
//! survive `GO` boundaries here the same way the interpreter treats
//! them (the batch separator does not reset the session).

use std::collections::{HashMap, HashSet};

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::ast::{Expr, ExprKind, Projection, Script, SelectItem, Stmt, StmtKind};

/// System values and functions available without declaration.
pub const BUILTINS: &[&str] = &["@@VERSION", "GETDATE", "CURRENT_TIMESTAMP"];

/// Run all static checks over a script.
pub fn check(script: &Script) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    for batch in &script.batches {
        checker.check_stmts(&batch.stmts);
    }
    checker.diags
}

struct Checker {
    variables: HashMap<String, ()>,
    schemas: HashMap<String, HashSet<String>>,
    loop_depth: usize,
    diags: Vec<Diagnostic>,
}

impl Checker {
    fn new() -> Self {
        Self {
            variables: HashMap::new(),
            schemas: HashMap::new(),
            loop_depth: 0,
            diags: Vec::new(),
        }
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        let mut terminated = false;
        for stmt in stmts {
            if terminated {
                self.diags.push(Diagnostic::warning(
                    Stage::Check,
                    DiagKind::UnreachableCode,
                    "statement is unreachable after BREAK",
                    stmt.span,
                ));
                terminated = false;
            }
            self.check_stmt(stmt);
            if matches!(stmt.kind, StmtKind::Break | StmtKind::Continue) {
                terminated = true;
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::CreateTable { table, columns } => {
                // Schema keys are uppercased; T-SQL names match
                // case-insensitively.
                let cols = columns
                    .iter()
                    .map(|c| c.name.to_ascii_uppercase())
                    .collect();
                self.schemas.insert(table.to_ascii_uppercase(), cols);
            }
            StmtKind::Insert { table, columns, rows } => {
                if let Some(known) = self.known_columns(table, stmt.span) {
                    if let Some(columns) = columns {
                        for column in columns {
                            if !known.contains(&column.to_ascii_uppercase()) {
                                self.unknown_column(table, column, stmt.span);
                            }
                        }
                    }
                }
                for row in rows {
                    for value in row {
                        self.check_expr(value, None);
                    }
                }
            }
            StmtKind::Select { columns, table, where_clause } => {
                if let Some(known) = self.known_columns(table, stmt.span) {
                    if let Projection::Items(items) = columns {
                        for item in items {
                            if let SelectItem::Column(column) = item {
                                if !known.contains(&column.to_ascii_uppercase()) {
                                    self.unknown_column(table, column, stmt.span);
                                }
                            }
                        }
                    }
                }
                if let Some(where_clause) = where_clause {
                    self.check_expr(where_clause, Some(table));
                }
            }
            StmtKind::Update { table, assignments, where_clause } => {
                if let Some(known) = self.known_columns(table, stmt.span) {
                    for (column, _) in assignments {
                        if !known.contains(&column.to_ascii_uppercase()) {
                            self.unknown_column(table, column, stmt.span);
                        }
                    }
                }
                for (_, value) in assignments {
                    self.check_expr(value, Some(table));
                }
                if let Some(where_clause) = where_clause {
                    self.check_expr(where_clause, Some(table));
                }
            }
            StmtKind::Delete { table, where_clause } => {
                let _ = self.known_columns(table, stmt.span);
                if let Some(where_clause) = where_clause {
                    self.check_expr(where_clause, Some(table));
                }
            }
            StmtKind::Print(value) => self.check_expr(value, None),
            StmtKind::Declare { name, init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init, None);
                }
                if self.variables.insert(name.clone(), ()).is_some() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::Redeclaration,
                        format!("variable '{name}' is already declared"),
                        stmt.span,
                    ));
                }
            }
            StmtKind::SetVar { name, value } => {
                if !self.variables.contains_key(name) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("variable '{name}' must be declared before SET"),
                        stmt.span,
                    ));
                }
                self.check_expr(value, None);
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_expr(cond, None);
                self.check_stmts(then_branch);
                self.check_stmts(else_branch);
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond, None);
                self.loop_depth += 1;
                self.check_stmts(body);
                self.loop_depth -= 1;
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::BreakOutsideLoop,
                        "'BREAK' outside WHILE loop",
                        stmt.span,
                    ));
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::ContinueOutsideLoop,
                        "'CONTINUE' outside WHILE loop",
                        stmt.span,
                    ));
                }
            }
        }
    }

    fn known_columns(&mut self, table: &str, span: Span) -> Option<HashSet<String>> {
        match self.schemas.get(&table.to_ascii_uppercase()) {
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

    /// `table` is the WHERE-context table whose columns bare
    /// identifiers may name.
    fn check_expr(&mut self, expr: &Expr, table: Option<&str>) {
        match &expr.kind {
            ExprKind::Var(name) => {
                if !self.variables.contains_key(name) && !BUILTINS.contains(&name.as_str()) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("variable '{name}' is not declared"),
                        expr.span,
                    ));
                }
            }
            ExprKind::Ident(name) => {
                if name.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
                    return;
                }
                if let Some(table) = table {
                    let known = self
                        .schemas
                        .get(&table.to_ascii_uppercase())
                        .map_or(true, |cols| cols.contains(&name.to_ascii_uppercase()));
                    if !known {
                        self.unknown_column(table, name, expr.span);
                    }
                } else {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{name}' is not defined outside a table context"),
                        expr.span,
                    ));
                }
            }
            ExprKind::FuncCall { name, args } => {
                if !BUILTINS.contains(&name.to_ascii_uppercase().as_str()) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{name}' is not a known function"),
                        expr.span,
                    ));
                }
                for arg in args {
                    self.check_expr(arg, table);
                }
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand, table),
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left, table);
                self.check_expr(right, table);
            }
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Null => {}
        }
    }
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
    fn test_clean_script() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nSELECT * FROM p WHERE id > 1;";
        assert!(kinds(src).is_empty());
    }

    #[test]
    fn test_undeclared_variable() {
        assert!(kinds("PRINT @nope").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_declared_variable_ok() {
        assert!(kinds("DECLARE @n INT = 1\nPRINT @n").is_empty());
    }

    #[test]
    fn test_set_before_declare() {
        assert!(kinds("SET @n = 1").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_unknown_table() {
        assert!(kinds("SELECT * FROM ghost").contains(&DiagKind::UnknownTable));
    }

    #[test]
    fn test_unknown_column_in_where() {
        let src = "CREATE TABLE p (id INT);\nSELECT * FROM p WHERE missing = 1;";
        assert!(kinds(src).contains(&DiagKind::UnknownColumn));
    }

    #[test]
    fn test_version_builtin() {
        assert!(kinds("PRINT @@VERSION").is_empty());
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(kinds("BREAK").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_variables_survive_go() {
        assert!(kinds("DECLARE @n INT = 1\nGO\nPRINT @n").is_empty());
    }

    #[test]
    fn test_count_star_does_not_need_column() {
        let src = "CREATE TABLE p (id INT);\nSELECT COUNT(*) FROM p;";
        assert!(kinds(src).is_empty());
    }
}
