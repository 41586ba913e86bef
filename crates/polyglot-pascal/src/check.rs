//! Static checks for Pascal programs.
//!
//! Pascal requires declaration before use, so name resolution is
//! strict: every identifier must come from a `var`/`const` section, a
//! parameter, a routine name, or the builtin set.

use std::collections::HashMap;

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::ast::{Decl, DeclKind, Expr, ExprKind, Program, Routine, Stmt, StmtKind};

/// Console builtins preloaded into the global scope.
pub const BUILTINS: &[&str] = &["write", "writeln", "read", "readln", "clrscr", "readkey"];

#[derive(Debug, Clone)]
enum BindingKind {
    Variable,
    Routine { arity: usize, is_function: bool },
    Builtin,
}

/// Run all static checks over a program.
pub fn check(program: &Program) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    checker.check_scope(&program.decls, &program.body, None);
    checker.diags
}

struct Checker {
    scopes: Vec<HashMap<String, BindingKind>>,
    loop_depth: usize,
    diags: Vec<Diagnostic>,
}

impl Checker {
    fn new() -> Self {
        let mut globals = HashMap::new();
        for name in BUILTINS {
            globals.insert((*name).to_string(), BindingKind::Builtin);
        }
        Self {
            scopes: vec![globals],
            loop_depth: 0,
            diags: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&BindingKind> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn declare(&mut self, name: &str, kind: BindingKind, span: Span) {
        let exists = self
            .scopes
            .last()
            .expect("scope stack never empty")
            .contains_key(name);
        if exists {
            self.diags.push(Diagnostic::error(
                Stage::Check,
                DiagKind::Redeclaration,
                format!("'{name}' is already declared in this scope"),
                span,
            ));
        }
        if BUILTINS.contains(&name) {
            self.diags.push(Diagnostic::warning(
                Stage::Check,
                DiagKind::ReservedName,
                format!("'{name}' shadows a builtin"),
                span,
            ));
        }
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .insert(name.to_string(), kind);
    }

    /// Check one declaration scope: a program or routine body.
    /// `function_name` is bound as assignable inside functions.
    fn check_scope(&mut self, decls: &[Decl], body: &[Stmt], function_name: Option<&str>) {
        for decl in decls {
            match &decl.kind {
                DeclKind::VarGroup { names, .. } => {
                    for name in names {
                        self.declare(name, BindingKind::Variable, decl.span);
                    }
                }
                DeclKind::ConstDef { name, value } => {
                    self.check_expr(value);
                    self.declare(name, BindingKind::Variable, decl.span);
                }
                DeclKind::Routine(routine) => {
                    self.declare(
                        &routine.name,
                        BindingKind::Routine {
                            arity: routine.params.len(),
                            is_function: routine.return_type.is_some(),
                        },
                        decl.span,
                    );
                }
            }
        }
        // Routine bodies are checked after the whole section so that
        // later siblings are visible (forward calls within the unit).
        for decl in decls {
            if let DeclKind::Routine(routine) = &decl.kind {
                self.check_routine(routine);
            }
        }
        if let Some(name) = function_name {
            // The function result variable.
            self.scopes
                .last_mut()
                .expect("scope stack never empty")
                .insert(name.to_string(), BindingKind::Variable);
        }
        self.check_block(body);
    }

    fn check_routine(&mut self, routine: &Routine) {
        self.scopes.push(HashMap::new());
        for param in &routine.params {
            self.declare(&param.name, BindingKind::Variable, routine.span);
        }
        let saved_loop = self.loop_depth;
        self.loop_depth = 0;
        self.check_scope(
            &routine.decls,
            &routine.body,
            routine.return_type.is_some().then_some(routine.name.as_str()),
        );
        self.loop_depth = saved_loop;
        self.scopes.pop();
    }

    fn check_block(&mut self, body: &[Stmt]) {
        let mut terminated: Option<&'static str> = None;
        for stmt in body {
            if let Some(why) = terminated {
                self.diags.push(Diagnostic::warning(
                    Stage::Check,
                    DiagKind::UnreachableCode,
                    format!("statement is unreachable after {why}"),
                    stmt.span,
                ));
                terminated = None;
            }
            self.check_stmt(stmt);
            match stmt.kind {
                StmtKind::Break => terminated = Some("break"),
                StmtKind::Continue => terminated = Some("continue"),
                _ => {}
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
                self.check_expr(value);
            }
            StmtKind::Call { name, args } => {
                self.check_call(name, args, stmt.span);
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_expr(cond);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::For { var, from, to, body, .. } => {
                if self.lookup(var).is_none() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("loop variable '{var}' is not declared"),
                        stmt.span,
                    ));
                }
                self.check_expr(from);
                self.check_expr(to);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::Repeat { body, until } => {
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                self.check_expr(until);
            }
            StmtKind::Compound(body) => self.check_block(body),
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::BreakOutsideLoop,
                        "'break' outside loop",
                        stmt.span,
                    ));
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::ContinueOutsideLoop,
                        "'continue' outside loop",
                        stmt.span,
                    ));
                }
            }
            StmtKind::Empty => {}
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr], span: Span) {
        for arg in args {
            self.check_expr(arg);
        }
        match self.lookup(name) {
            None => self.diags.push(Diagnostic::error(
                Stage::Check,
                DiagKind::NameNotFound,
                format!("'{name}' is not declared"),
                span,
            )),
            Some(BindingKind::Routine { arity, .. }) => {
                if args.len() != *arity {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::ArityMismatch,
                        format!("'{name}' expects {arity} argument(s), got {}", args.len()),
                        span,
                    ));
                }
            }
            Some(_) => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if self.lookup(name).is_none() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{name}' is not declared"),
                        expr.span,
                    ));
                }
            }
            ExprKind::Call { name, args } => self.check_call(name, args, expr.span),
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Int(_) | ExprKind::Real(_) | ExprKind::Str(_) | ExprKind::Bool(_) => {}
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
        let (program, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        check(&program).into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_program() {
        assert!(kinds("program t; var x:integer; begin x := 7; writeln('x=', x); end.").is_empty());
    }

    #[test]
    fn test_undeclared_variable() {
        assert!(kinds("program p; begin x := 1; end.").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_duplicate_declaration() {
        assert!(
            kinds("program p; var x: integer; x: integer; begin end.")
                .contains(&DiagKind::Redeclaration)
        );
    }

    #[test]
    fn test_function_result_assignable() {
        let src = "program p;\nfunction sq(n: integer): integer;\nbegin sq := n * n; end;\nbegin writeln(sq(3)); end.";
        assert!(kinds(src).is_empty());
    }

    #[test]
    fn test_arity_mismatch() {
        let src = "program p;\nprocedure one(n: integer);\nbegin writeln(n); end;\nbegin one(1, 2); end.";
        assert!(kinds(src).contains(&DiagKind::ArityMismatch));
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(kinds("program p; begin break; end.").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_break_inside_loop_ok() {
        let src = "program p; var i: integer; begin for i := 1 to 3 do break; end.";
        assert!(!kinds(src).contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_nested_procedure_sees_outer_vars() {
        let src = "program p;\nvar g: integer;\nprocedure touch;\nbegin g := 1; end;\nbegin touch; end.";
        assert!(kinds(src).is_empty());
    }
}
