//! Static checks for JavaScript programs.
//!
//! Block-scoped `let`/`const` redeclarations are errors; `var` is
//! function-scoped and tolerated. Loop/function placement checks and
//! unreachable-code detection follow the shared checker contract.

use std::collections::HashMap;

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::ast::{ArrowBody, Expr, ExprKind, MemberProp, Program, Stmt, StmtKind, TemplateElem};

/// Names preloaded into the interpreter's global scope.
pub const BUILTINS: &[&str] = &["console", "NaN", "Infinity", "undefined"];

#[derive(Debug, Clone)]
enum BindingKind {
    Mutable,
    Function { arity: usize },
    Builtin,
}

/// Run all static checks over a program.
pub fn check(program: &Program) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    checker.check_block(&program.body, true);
    checker.diags
}

struct Checker {
    scopes: Vec<HashMap<String, BindingKind>>,
    loop_depth: usize,
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

    fn declare(&mut self, name: &str, kind: BindingKind, strict: bool, span: Span) {
        let exists = self
            .scopes
            .last()
            .expect("scope stack never empty")
            .contains_key(name);
        if strict && exists {
            self.diags.push(Diagnostic::error(
                Stage::Check,
                DiagKind::Redeclaration,
                format!("identifier '{name}' has already been declared"),
                span,
            ));
        }
        if BUILTINS.contains(&name) {
            self.diags.push(Diagnostic::warning(
                Stage::Check,
                DiagKind::ReservedName,
                format!("'{name}' shadows a global builtin"),
                span,
            ));
        }
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .insert(name.to_string(), kind);
    }

    fn check_block(&mut self, body: &[Stmt], own_scope: bool) {
        if own_scope {
            self.scopes.push(HashMap::new());
        }
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
                StmtKind::Return(_) => terminated = Some("return"),
                StmtKind::Break => terminated = Some("break"),
                StmtKind::Continue => terminated = Some("continue"),
                _ => {}
            }
        }
        if own_scope {
            self.scopes.pop();
        }
    }

    fn check_function(&mut self, params: &[String], body: &[Stmt], span: Span) {
        self.scopes.push(HashMap::new());
        let mut seen = HashMap::new();
        for param in params {
            if seen.insert(param.clone(), ()).is_some() {
                self.diags.push(Diagnostic::error(
                    Stage::Check,
                    DiagKind::Redeclaration,
                    format!("duplicate parameter '{param}'"),
                    span,
                ));
            }
            self.declare(param, BindingKind::Mutable, false, span);
        }
        let (saved_loop, saved_fn) = (self.loop_depth, self.fn_depth);
        self.loop_depth = 0;
        self.fn_depth += 1;
        self.check_block(body, false);
        self.loop_depth = saved_loop;
        self.fn_depth = saved_fn;
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { decl, name, init } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
                let strict = !matches!(decl, crate::ast::DeclKind::Var);
                self.declare(name, BindingKind::Mutable, strict, stmt.span);
            }
            StmtKind::FunctionDecl { name, params, body } => {
                self.declare(
                    name,
                    BindingKind::Function { arity: params.len() },
                    false,
                    stmt.span,
                );
                self.check_function(params, body, stmt.span);
            }
            StmtKind::ClassDecl { name, methods } => {
                self.declare(name, BindingKind::Mutable, true, stmt.span);
                for method in methods {
                    self.check_function(&method.params, &method.body, method.span);
                }
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
            StmtKind::For { init, cond, update, body } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            StmtKind::ForEach { name, subject, body, .. } => {
                self.check_expr(subject);
                self.scopes.push(HashMap::new());
                self.declare(name, BindingKind::Mutable, false, stmt.span);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            StmtKind::Block(body) => self.check_block(body, true),
            StmtKind::ExprStmt(expr) => self.check_expr(expr),
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

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if self.lookup(name).is_none() {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{name}' is not defined"),
                        expr.span,
                    ));
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.check_expr(value);
                match &target.kind {
                    // Assignment to an undeclared name is an implicit
                    // global in sloppy mode; treat it as a declaration.
                    ExprKind::Ident(name) => {
                        if self.lookup(name).is_none() {
                            self.scopes
                                .first_mut()
                                .expect("global scope")
                                .insert(name.clone(), BindingKind::Mutable);
                        }
                    }
                    _ => self.check_expr(target),
                }
            }
            ExprKind::Call { callee, args } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
                if let ExprKind::Ident(name) = &callee.kind {
                    if let Some(BindingKind::Function { arity }) = self.lookup(name) {
                        if args.len() != *arity {
                            self.diags.push(Diagnostic::error(
                                Stage::Check,
                                DiagKind::ArityMismatch,
                                format!(
                                    "{name}() declared with {arity} parameter(s) but called with {}",
                                    args.len()
                                ),
                                expr.span,
                            ));
                        }
                    }
                }
            }
            ExprKind::New { callee, args } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::Arrow { params, body } => match body {
                ArrowBody::Expr(inner) => {
                    self.scopes.push(HashMap::new());
                    for param in params {
                        self.declare(param, BindingKind::Mutable, false, expr.span);
                    }
                    let saved = self.fn_depth;
                    self.fn_depth += 1;
                    self.check_expr(inner);
                    self.fn_depth = saved;
                    self.scopes.pop();
                }
                ArrowBody::Block(body) => self.check_function(params, body, expr.span),
            },
            ExprKind::FunctionExpr { params, body } => {
                self.check_function(params, body, expr.span);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                self.check_expr(test);
                self.check_expr(consequent);
                self.check_expr(alternate);
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Update { target, .. } => self.check_expr(target),
            ExprKind::Member { obj, prop } => {
                self.check_expr(obj);
                if let MemberProp::Computed(index) = prop {
                    self.check_expr(index);
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    self.check_expr(item);
                }
            }
            ExprKind::Object(props) => {
                for (_, value) in props {
                    self.check_expr(value);
                }
            }
            ExprKind::Template(elems) => {
                for elem in elems {
                    if let TemplateElem::Interp(inner) = elem {
                        self.check_expr(inner);
                    }
                }
            }
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::This => {}
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
        assert!(kinds("let t = 0;\nfor (let i=1; i<=4; i++) t += i;\nconsole.log(t);\n").is_empty());
    }

    #[test]
    fn test_let_redeclaration() {
        assert!(kinds("let x = 1;\nlet x = 2;\n").contains(&DiagKind::Redeclaration));
    }

    #[test]
    fn test_var_redeclaration_tolerated() {
        assert!(!kinds("var x = 1;\nvar x = 2;\n").contains(&DiagKind::Redeclaration));
    }

    #[test]
    fn test_block_scope_allows_shadowing() {
        assert!(kinds("let x = 1;\n{ let x = 2; console.log(x); }\n").is_empty());
    }

    #[test]
    fn test_undefined_name() {
        assert!(kinds("console.log(missing);\n").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(kinds("break;\n").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_return_outside_function() {
        assert!(kinds("return 1;\n").contains(&DiagKind::ReturnOutsideFunction));
    }

    #[test]
    fn test_arity_check() {
        assert!(kinds("function f(a, b) { return a; }\nf(1);\n").contains(&DiagKind::ArityMismatch));
    }

    #[test]
    fn test_unreachable_after_return() {
        assert!(kinds("function f() { return 1; let x = 2; }\n").contains(&DiagKind::UnreachableCode));
    }

    #[test]
    fn test_arrow_params_scoped() {
        assert!(kinds("const f = x => x + 1;\nconsole.log(f(1));\n").is_empty());
    }
}
