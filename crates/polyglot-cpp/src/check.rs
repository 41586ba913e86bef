//! Static checks for C++ translation units.
//!
//! The stream names `cout`/`cin`/`endl` resolve either qualified
//! (`std::cout`) or bare once a `using namespace std;` item has been
//! seen — the checker tracks that the same way the interpreter does.

use std::collections::HashMap;

use polyglot_lang_core::{DiagKind, Diagnostic, Span, Stage};

use crate::ast::{Expr, ExprKind, Item, ItemKind, Stmt, StmtKind, TranslationUnit};

/// Stream builtins in namespace `std`.
pub const STD_BUILTINS: &[&str] = &["cout", "cin", "endl"];

#[derive(Debug, Clone)]
enum BindingKind {
    Variable,
    Function { arity: usize },
}

/// Run all static checks over a translation unit.
pub fn check(unit: &TranslationUnit) -> Vec<Diagnostic> {
    let mut checker = Checker::new();
    checker.check_unit(unit);
    checker.diags
}

struct Checker {
    scopes: Vec<HashMap<String, BindingKind>>,
    using_std: bool,
    loop_depth: usize,
    fn_depth: usize,
    diags: Vec<Diagnostic>,
}

impl Checker {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            using_std: false,
            loop_depth: 0,
            fn_depth: 0,
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
        self.scopes
            .last_mut()
            .expect("scope stack never empty")
            .insert(name.to_string(), kind);
    }

    fn check_unit(&mut self, unit: &TranslationUnit) {
        // Hoist function signatures so call order does not matter.
        for item in &unit.items {
            if let ItemKind::Function { name, params, .. } = &item.kind {
                self.scopes
                    .first_mut()
                    .expect("global scope")
                    .insert(name.clone(), BindingKind::Function { arity: params.len() });
            }
        }
        for item in &unit.items {
            self.check_item(item);
        }
    }

    fn check_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Preproc(_) => {}
            ItemKind::UsingNamespace(name) => {
                if name == "std" {
                    self.using_std = true;
                }
            }
            ItemKind::GlobalVar { name, init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
                self.declare(name, BindingKind::Variable, item.span);
            }
            ItemKind::Function { params, body, .. } => {
                self.scopes.push(HashMap::new());
                for param in params {
                    self.declare(&param.name, BindingKind::Variable, item.span);
                }
                self.fn_depth += 1;
                self.check_block(body, false);
                self.fn_depth -= 1;
                self.scopes.pop();
            }
        }
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

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { name, init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
                self.declare(name, BindingKind::Variable, stmt.span);
            }
            StmtKind::ExprStmt(expr) => self.check_expr(expr),
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
            StmtKind::Block(body) => self.check_block(body, true),
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

    fn resolves(&self, parts: &[String]) -> bool {
        match parts {
            [single] => {
                self.lookup(single).is_some()
                    || (self.using_std && STD_BUILTINS.contains(&single.as_str()))
            }
            [ns, name] if ns == "std" => STD_BUILTINS.contains(&name.as_str()),
            _ => false,
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(parts) => {
                if !self.resolves(parts) {
                    self.diags.push(Diagnostic::error(
                        Stage::Check,
                        DiagKind::NameNotFound,
                        format!("'{}' is not declared", parts.join("::")),
                        expr.span,
                    ));
                }
            }
            ExprKind::Call { callee, args } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
                if let ExprKind::Ident(parts) = &callee.kind {
                    if let [name] = parts.as_slice() {
                        if let Some(BindingKind::Function { arity }) = self.lookup(name) {
                            if args.len() != *arity {
                                self.diags.push(Diagnostic::error(
                                    Stage::Check,
                                    DiagKind::ArityMismatch,
                                    format!(
                                        "'{name}' expects {arity} argument(s), got {}",
                                        args.len()
                                    ),
                                    expr.span,
                                ));
                            }
                        }
                    }
                }
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Update { target, .. } => self.check_expr(target),
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                self.check_expr(test);
                self.check_expr(consequent);
                self.check_expr(alternate);
            }
            ExprKind::Assign { target, value, .. } => {
                self.check_expr(target);
                self.check_expr(value);
            }
            ExprKind::Index { obj, index } => {
                self.check_expr(obj);
                self.check_expr(index);
            }
            ExprKind::Member { obj, .. } => self.check_expr(obj),
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::CharLit(_)
            | ExprKind::Bool(_) => {}
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
        let (unit, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        check(&unit).into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_unit() {
        let src = "#include <iostream>\nusing namespace std;\nint main() {\n    cout << 1 << endl;\n    return 0;\n}\n";
        assert!(kinds(src).is_empty());
    }

    #[test]
    fn test_bare_cout_without_using_is_error() {
        let src = "int main() { cout << 1; return 0; }\n";
        assert!(kinds(src).contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_qualified_cout_always_resolves() {
        let src = "int main() { std::cout << 1; return 0; }\n";
        assert!(kinds(src).is_empty());
    }

    #[test]
    fn test_undeclared_variable() {
        assert!(kinds("int main() { x = 1; return 0; }\n").contains(&DiagKind::NameNotFound));
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        assert!(kinds("int main() { int x = 1; int x = 2; return 0; }\n")
            .contains(&DiagKind::Redeclaration));
    }

    #[test]
    fn test_arity_mismatch() {
        let src = "int add(int a, int b) { return a + b; }\nint main() { return add(1); }\n";
        assert!(kinds(src).contains(&DiagKind::ArityMismatch));
    }

    #[test]
    fn test_call_before_definition_ok() {
        let src = "int main() { return late(); }\nint late() { return 1; }\n";
        assert!(kinds(src).is_empty());
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(kinds("int main() { break; return 0; }\n").contains(&DiagKind::BreakOutsideLoop));
    }

    #[test]
    fn test_unreachable_after_return() {
        assert!(kinds("int main() { return 0; int x = 1; }\n").contains(&DiagKind::UnreachableCode));
    }
}
