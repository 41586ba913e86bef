//! Static checks for Python modules.
//!
//! Mirrors the interpreter's scoping (module and function scopes only,
//! no block scopes). Output is diagnostics only; the AST is untouched.

use std::collections::HashMap;

use polyglot_lang_core::{DiagKind, Diagnostic, Stage};

use crate::ast::{Expr, ExprKind, Module, Stmt, StmtKind};

/// Names preloaded into the interpreter's global scope.
pub const BUILTINS: &[&str] = &[
    "print", "range", "len", "int", "float", "str", "bool", "list", "dict",
];

/// Builtins with a declared arity; the rest are exempt from checks.
fn builtin_arity(name: &str) -> Option<usize> {
    match name {
        "len" => Some(1),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum BindingKind {
    Variable,
    Function { arity: usize },
    Builtin,
}

/// Run all static checks over a module.
pub fn check(module: &Module) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    checker.check_block(&module.body);
    checker.diags
}

struct Checker {
    /// Innermost scope last. Index 0 is the module scope.
    scopes: Vec<HashMap<String, BindingKind>>,
    /// Loop nesting inside the current function frame.
    loop_depth: usize,
    /// Function nesting depth.
    fn_depth: usize,
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
            fn_depth: 0,
            diags: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&BindingKind> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn is_builtin(&self, name: &str) -> bool {
        BUILTINS.contains(&name)
    }

    fn bind(&mut self, name: &str, kind: BindingKind, span: polyglot_lang_core::Span) {
        if self.is_builtin(name) && !matches!(kind, BindingKind::Builtin) {
            self.diags.push(Diagnostic::info(
                Stage::Check,
                DiagKind::ReservedName,
                format!("'{name}' shadows a builtin"),
                span,
            ));
        }
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), kind);
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
                // Flag once per block, then keep checking the rest.
                terminated = None;
            }
            self.check_stmt(stmt);
            match stmt.kind {
                StmtKind::Return(_) => terminated = Some("return"),
                StmtKind::Break => terminated = Some("break"),
                StmtKind::Continue => terminated = Some("continue"),
                _ => {}
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::FunctionDef { name, params, body } => {
                self.bind(name, BindingKind::Function { arity: params.len() }, stmt.span);
                self.scopes.push(HashMap::new());
                let mut seen = HashMap::new();
                for param in params {
                    if seen.insert(param.clone(), ()).is_some() {
                        self.diags.push(Diagnostic::error(
                            Stage::Check,
                            DiagKind::Redeclaration,
                            format!("duplicate parameter '{param}'"),
                            stmt.span,
                        ));
                    }
                    self.bind(param, BindingKind::Variable, stmt.span);
                }
                let (saved_loop, saved_fn) = (self.loop_depth, self.fn_depth);
                self.loop_depth = 0;
                self.fn_depth += 1;
                self.check_block(body);
                self.loop_depth = saved_loop;
                self.fn_depth = saved_fn;
                self.scopes.pop();
            }
            StmtKind::Return(value) => {
                if self.fn_depth == 0 {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::ReturnOutsideFunction,
                        "'return' outside function",
                        stmt.span,
                    ));
                }
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    self.check_expr(cond);
                    self.check_block(body);
                }
                self.check_block(orelse);
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            StmtKind::For { target, iter, body } => {
                self.check_expr(iter);
                self.bind(target, BindingKind::Variable, stmt.span);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            StmtKind::Assign { target, value } => {
                self.check_expr(value);
                self.check_assign_target(target);
            }
            StmtKind::AugAssign { target, value, .. } => {
                // `x += 1` reads before it writes.
                self.check_expr(target);
                self.check_expr(value);
            }
            StmtKind::ExprStmt(expr) => self.check_expr(expr),
            StmtKind::Assert { test, detail } => {
                self.check_expr(test);
                if let Some(detail) = detail {
                    self.check_expr(detail);
                }
            }
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
            StmtKind::Pass => {}
        }
    }

    fn check_assign_target(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(name) => {
                self.bind(name, BindingKind::Variable, target.span);
            }
            ExprKind::Index { obj, index } => {
                self.check_expr(obj);
                self.check_expr(index);
            }
            ExprKind::Attr { obj, .. } => self.check_expr(obj),
            _ => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(name) => {
                if self.lookup(name).is_none() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("name '{name}' is not defined"),
                        expr.span,
                    ));
                }
            }
            ExprKind::Call { func, args } => {
                self.check_expr(func);
                for arg in args {
                    self.check_expr(arg);
                }
                if let ExprKind::Name(name) = &func.kind {
                    let declared = match self.lookup(name) {
                        Some(BindingKind::Function { arity }) => Some(*arity),
                        Some(BindingKind::Builtin) => builtin_arity(name),
                        _ => None,
                    };
                    if let Some(arity) = declared {
                        if args.len() != arity {
                            self.diags.push(Diagnostic::error(
                                Stage::Check,
                                DiagKind::ArityMismatch,
                                format!(
                                    "{name}() takes {arity} argument(s) but {} were given",
                                    args.len()
                                ),
                                expr.span,
                            ));
                        }
                    }
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Index { obj, index } => {
                self.check_expr(obj);
                self.check_expr(index);
            }
            ExprKind::Attr { obj, .. } => self.check_expr(obj),
            ExprKind::List(items) => {
                for item in items {
                    self.check_expr(item);
                }
            }
            ExprKind::Dict(entries) => {
                for (key, value) in entries {
                    self.check_expr(key);
                    self.check_expr(value);
                }
            }
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit => {}
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

    fn check_src(src: &str) -> Vec<Diagnostic> {
        let (tokens, _) = lex(src);
        let (module, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse failed: {parse_diags:?}");
        check(&module)
    }

    fn kinds(src: &str) -> Vec<DiagKind> {
        check_src(src).into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_module() {
        assert!(check_src("def add(a,b):\n    return a+b\n\nprint(add(2,3))\n").is_empty());
    }

    #[test]
    fn test_undefined_name() {
        assert!(kinds("print(missing)\n").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(kinds("break\n").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_continue_inside_loop_ok() {
        assert!(!kinds("while x:\n    continue\nx = 1\n")
            .contains(&DiagKind::ContinueOutsideLoop));
    }

    #[test]
    fn test_return_outside_function() {
        assert!(kinds("return 1\n").contains(&DiagKind::ReturnOutsideFunction));
    }

    #[test]
    fn test_loop_depth_resets_in_nested_function() {
        let src = "while x:\n    def f():\n        break\nx = 1\n";
        assert!(kinds(src).contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_unreachable_after_return() {
        let src = "def f():\n    return 1\n    print(2)\n";
        assert!(kinds(src).contains(&DiagKind::UnreachableCode));
    }

    #[test]
    fn test_arity_mismatch() {
        let src = "def f(a):\n    return a\n\nf(1, 2)\n";
        assert!(kinds(src).contains(&DiagKind::ArityMismatch));
    }

    #[test]
    fn test_builtin_len_arity() {
        assert!(kinds("len()\n").contains(&DiagKind::ArityMismatch));
    }

    #[test]
    fn test_shadowing_builtin_is_info() {
        let diags = check_src("print = 1\n");
        let d = diags
            .iter()
            .find(|d| d.kind == DiagKind::ReservedName)
            .expect("shadow diagnostic");
        assert_eq!(d.severity, polyglot_lang_core::Severity::Info);
    }

    #[test]
    fn test_duplicate_parameter() {
        assert!(kinds("def f(a, a):\n    return a\n").contains(&DiagKind::Redeclaration));
    }

    #[test]
    fn test_assignment_then_use_ok() {
        assert!(check_src("x = 1\nprint(x)\n").is_empty());
    }
}
