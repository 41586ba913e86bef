//! C++ interpreter — walks the translation unit.
//!
//! Execution installs globals, then calls `main`. Stream insertion is
//! value-driven: `std::cout` evaluates to a stream handle, `<<` on the
//! handle writes its right operand and yields the handle again, so
//! chains behave like the real operator.

use std::rc::Rc;

use polyglot_lang_core::{AbortFlag, Diagnostic, Span};
use polyglot_runtime::{Builtin, Flow, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind, Value};

use crate::ast::{
    BinOp, Expr, ExprKind, ItemKind, ParamDecl, Stmt, StmtKind, TranslationUnit, Type, UnaryOp,
};

/// A defined C++ function.
#[derive(Debug)]
pub struct CppFunction {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<ParamDecl>,
    pub body: Vec<Stmt>,
    pub closure: ScopeId,
}

type CppValue = Value<CppFunction>;

/// Result of executing a translation unit.
#[derive(Debug)]
pub struct RunResult {
    pub stdout: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run a parsed translation unit (executes `main`).
pub fn interpret(unit: &TranslationUnit, abort: &AbortFlag) -> RunResult {
    let mut interp = Interp::new(abort.clone());
    let outcome = interp.run(unit);
    let mut diagnostics = std::mem::take(&mut interp.diags);
    if let Err(err) = outcome {
        diagnostics.push(err.to_diagnostic());
    }
    RunResult {
        stdout: interp.out.finish(),
        diagnostics,
    }
}

struct Interp {
    arena: ScopeArena<CppFunction>,
    globals: ScopeId,
    out: Output,
    diags: Vec<Diagnostic>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<CppFunction>, RuntimeError>;
type EvalResult = Result<CppValue, RuntimeError>;

impl Interp {
    fn new(abort: AbortFlag) -> Self {
        let mut arena = ScopeArena::new();
        let globals = arena.push(None);
        Self {
            arena,
            globals,
            out: Output::new(),
            diags: Vec::new(),
            abort,
        }
    }

    fn run(&mut self, unit: &TranslationUnit) -> Result<(), RuntimeError> {
        let mut main_span = None;
        for item in &unit.items {
            match &item.kind {
                ItemKind::Preproc(_) | ItemKind::UsingNamespace(_) => {}
                ItemKind::GlobalVar { ty, name, init } => {
                    let value = match init {
                        Some(init) => self.eval(init, self.globals)?,
                        None => default_value(ty),
                    };
                    self.arena
                        .declare(self.globals, name.clone(), value, SymbolKind::Variable);
                }
                ItemKind::Function { return_type, name, params, body } => {
                    if name == "main" {
                        main_span = Some(item.span);
                    }
                    let function = Value::Function(Rc::new(CppFunction {
                        name: name.clone(),
                        return_type: return_type.clone(),
                        params: params.clone(),
                        body: body.clone(),
                        closure: self.globals,
                    }));
                    self.arena
                        .declare(self.globals, name.clone(), function, SymbolKind::Function);
                }
            }
        }

        if let Some(span) = main_span {
            let main = self
                .arena
                .lookup(self.globals, "main")
                .map(|b| b.value.clone())
                .expect("main was just installed");
            self.call_value(main, Vec::new(), span)?;
        }
        Ok(())
    }

    // -- statements ------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], scope: ScopeId) -> ExecResult {
        for stmt in body {
            if self.abort.is_set() {
                return Err(RuntimeError::Cancelled { span: stmt.span });
            }
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> ExecResult {
        match &stmt.kind {
            StmtKind::VarDecl { ty, name, init } => {
                let value = match init {
                    Some(init) => self.eval(init, scope)?,
                    None => default_value(ty),
                };
                self.arena.declare(scope, name.clone(), value, SymbolKind::Variable);
                Ok(Flow::Normal)
            }
            StmtKind::ExprStmt(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let test = self.eval(cond, scope)?;
                if truthy(&test) {
                    self.exec_stmt(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    if self.abort.is_set() {
                        return Err(RuntimeError::Cancelled { span: stmt.span });
                    }
                    let test = self.eval(cond, scope)?;
                    if !truthy(&test) {
                        break;
                    }
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { init, cond, update, body } => {
                let loop_scope = self.arena.push(Some(scope));
                if let Some(init) = init {
                    self.exec_stmt(init, loop_scope)?;
                }
                loop {
                    if self.abort.is_set() {
                        return Err(RuntimeError::Cancelled { span: stmt.span });
                    }
                    if let Some(cond) = cond {
                        let test = self.eval(cond, loop_scope)?;
                        if !truthy(&test) {
                            break;
                        }
                    }
                    match self.exec_stmt(body, loop_scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval(update, loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Block(body) => {
                let inner = self.arena.push(Some(scope));
                self.exec_block(body, inner)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Empty => Ok(Flow::Normal),
        }
    }

    // -- expressions -----------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::CharLit(c) => Ok(Value::Str(c.to_string())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Ident(parts) => self.resolve(parts, scope, expr.span),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(RuntimeError::TypeError {
                            message: format!("cannot negate {}", other.type_name()),
                            span: expr.span,
                        }),
                    },
                    UnaryOp::Pos => Ok(value),
                }
            }
            ExprKind::Update { inc, prefix, target } => {
                let old = self.eval(target, scope)?;
                let new = match old {
                    Value::Int(n) => Value::Int(if *inc { n + 1 } else { n - 1 }),
                    Value::Float(x) => Value::Float(if *inc { x + 1.0 } else { x - 1.0 }),
                    ref other => {
                        return Err(RuntimeError::TypeError {
                            message: format!("cannot increment {}", other.type_name()),
                            span: expr.span,
                        })
                    }
                };
                self.write_target(target, new.clone(), scope)?;
                Ok(if *prefix { new } else { old })
            }
            ExprKind::Binary { op, left, right } => match op {
                BinOp::And => {
                    let lhs = self.eval(left, scope)?;
                    if !truthy(&lhs) {
                        return Ok(Value::Bool(false));
                    }
                    let rhs = self.eval(right, scope)?;
                    Ok(Value::Bool(truthy(&rhs)))
                }
                BinOp::Or => {
                    let lhs = self.eval(left, scope)?;
                    if truthy(&lhs) {
                        return Ok(Value::Bool(true));
                    }
                    let rhs = self.eval(right, scope)?;
                    Ok(Value::Bool(truthy(&rhs)))
                }
                BinOp::Shl => {
                    let lhs = self.eval(left, scope)?;
                    if is_stream(&lhs, "std::cout") {
                        let rhs = self.eval(right, scope)?;
                        self.insert_into_cout(&rhs);
                        return Ok(lhs);
                    }
                    let rhs = self.eval(right, scope)?;
                    self.shift(BinOp::Shl, lhs, rhs, expr.span)
                }
                BinOp::Shr => {
                    let lhs = self.eval(left, scope)?;
                    if is_stream(&lhs, "std::cin") {
                        // Read stub: extraction zeroes the target.
                        self.write_target(right, Value::Int(0), scope)?;
                        return Ok(lhs);
                    }
                    let rhs = self.eval(right, scope)?;
                    self.shift(BinOp::Shr, lhs, rhs, expr.span)
                }
                _ => {
                    let lhs = self.eval(left, scope)?;
                    let rhs = self.eval(right, scope)?;
                    self.binary(*op, lhs, rhs, expr.span)
                }
            },
            ExprKind::Conditional { test, consequent, alternate } => {
                let test = self.eval(test, scope)?;
                if truthy(&test) {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let value = self.eval(value, scope)?;
                let value = match op {
                    Some(op) => {
                        let current = self.eval(target, scope)?;
                        self.binary(*op, current, value, expr.span)?
                    }
                    None => value,
                };
                self.write_target(target, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval(callee, scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call_value(callee_value, values, expr.span)
            }
            ExprKind::Index { obj, .. } => Err(RuntimeError::TypeError {
                message: "indexing is not supported in this subset".to_string(),
                span: obj.span,
            }),
            ExprKind::Member { obj, name } => {
                let _ = self.eval(obj, scope)?;
                Err(RuntimeError::TypeError {
                    message: format!("member access '.{name}' is not supported in this subset"),
                    span: obj.span,
                })
            }
        }
    }

    fn resolve(&mut self, parts: &[String], scope: ScopeId, span: Span) -> EvalResult {
        let joined = parts.join("::");
        match joined.as_str() {
            "cout" | "std::cout" => {
                return Ok(Value::Builtin(Builtin { name: "std::cout", arity: None }))
            }
            "endl" | "std::endl" => {
                return Ok(Value::Builtin(Builtin { name: "std::endl", arity: None }))
            }
            "cin" | "std::cin" => {
                return Ok(Value::Builtin(Builtin { name: "std::cin", arity: None }))
            }
            _ => {}
        }
        if let [name] = parts {
            if let Some(binding) = self.arena.lookup(scope, name) {
                return Ok(binding.value.clone());
            }
        }
        Err(RuntimeError::NameNotDefined { name: joined, span })
    }

    fn shift(&mut self, op: BinOp, lhs: CppValue, rhs: CppValue, span: Span) -> EvalResult {
        let (a, b) = match (lhs.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(RuntimeError::TypeError {
                    message: format!(
                        "operator '{}' needs integer operands, got {} and {}",
                        op.symbol(),
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                    span,
                })
            }
        };
        let result = match op {
            BinOp::Shl => a.wrapping_shl(b.max(0) as u32),
            BinOp::Shr => a.wrapping_shr(b.max(0) as u32),
            _ => unreachable!(),
        };
        Ok(Value::Int(result))
    }

    fn insert_into_cout(&mut self, value: &CppValue) {
        match value {
            Value::Builtin(builtin) if builtin.name == "std::endl" => self.out.end_line(),
            other => {
                let text = cpp_str(other);
                self.out.write(&text);
            }
        }
    }

    fn write_target(
        &mut self,
        target: &Expr,
        value: CppValue,
        scope: ScopeId,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Ident(parts) if parts.len() == 1 => {
                if self.arena.assign(scope, &parts[0], value) {
                    Ok(())
                } else {
                    Err(RuntimeError::NameNotDefined {
                        name: parts[0].clone(),
                        span: target.span,
                    })
                }
            }
            _ => Err(RuntimeError::TypeError {
                message: "invalid assignment target".to_string(),
                span: target.span,
            }),
        }
    }

    fn call_value(&mut self, callee: CppValue, args: Vec<CppValue>, span: Span) -> EvalResult {
        match callee {
            Value::Function(function) => {
                if args.len() != function.params.len() {
                    return Err(RuntimeError::ArityMismatch {
                        name: function.name.clone(),
                        expected: function.params.len(),
                        got: args.len(),
                        span,
                    });
                }
                let frame = self.arena.push(Some(function.closure));
                for (param, value) in function.params.iter().zip(args) {
                    self.arena
                        .declare(frame, param.name.clone(), value, SymbolKind::Parameter);
                }
                match self.exec_block(&function.body, frame)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Null),
                }
            }
            other => Err(RuntimeError::UncallableValue {
                type_name: other.type_name().to_string(),
                span,
            }),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: CppValue, rhs: CppValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            Add => match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                _ => self.arith(op, lhs, rhs, span),
            },
            Sub | Mul => self.arith(op, lhs, rhs, span),
            Div => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    if *b == 0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Int(a / b))
                    }
                }
                _ => {
                    let (a, b) = self.float_pair(&lhs, &rhs, "/", span)?;
                    // IEEE semantics in floating context.
                    Ok(Value::Float(a / b))
                }
            },
            Mod => match (lhs.as_int(), rhs.as_int()) {
                (Some(a), Some(b)) => {
                    if b == 0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Int(a % b))
                    }
                }
                _ => Err(RuntimeError::TypeError {
                    message: "operator '%' needs integer operands".to_string(),
                    span,
                }),
            },
            Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
            Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            Lt | Gt | Le | Ge => {
                let ordering = match (&lhs, &rhs) {
                    (a, b) if a.is_numeric() && b.is_numeric() => a
                        .as_float()
                        .unwrap()
                        .partial_cmp(&b.as_float().unwrap()),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => None,
                };
                let Some(ordering) = ordering else {
                    self.diags.push(Diagnostic::warning(
                        polyglot_lang_core::Stage::Run,
                        polyglot_lang_core::DiagKind::TypeError,
                        format!(
                            "comparison between '{}' and '{}' is always false",
                            lhs.type_name(),
                            rhs.type_name()
                        ),
                        span,
                    ));
                    return Ok(Value::Bool(false));
                };
                let result = match op {
                    Lt => ordering == std::cmp::Ordering::Less,
                    Gt => ordering == std::cmp::Ordering::Greater,
                    Le => ordering != std::cmp::Ordering::Greater,
                    Ge => ordering != std::cmp::Ordering::Less,
                    _ => unreachable!(),
                };
                Ok(Value::Bool(result))
            }
            BitAnd | BitOr | BitXor => {
                let (a, b) = match (lhs.as_int(), rhs.as_int()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(RuntimeError::TypeError {
                            message: format!("operator '{}' needs integer operands", op.symbol()),
                            span,
                        })
                    }
                };
                let result = match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    BitXor => a ^ b,
                    _ => unreachable!(),
                };
                Ok(Value::Int(result))
            }
            And | Or | Shl | Shr => unreachable!("handled in eval"),
        }
    }

    fn arith(&mut self, op: BinOp, lhs: CppValue, rhs: CppValue, span: Span) -> EvalResult {
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    BinOp::Add => a.wrapping_add(*b),
                    BinOp::Sub => a.wrapping_sub(*b),
                    BinOp::Mul => a.wrapping_mul(*b),
                    _ => unreachable!(),
                };
                Ok(Value::Int(result))
            }
            _ => {
                let (a, b) = self.float_pair(&lhs, &rhs, op.symbol(), span)?;
                let result = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    _ => unreachable!(),
                };
                Ok(Value::Float(result))
            }
        }
    }

    fn float_pair(
        &self,
        lhs: &CppValue,
        rhs: &CppValue,
        op: &str,
        span: Span,
    ) -> Result<(f64, f64), RuntimeError> {
        match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RuntimeError::TypeError {
                message: format!(
                    "operator '{op}' is not applicable to {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ),
                span,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn is_stream(value: &CppValue, name: &str) -> bool {
    matches!(value, Value::Builtin(b) if b.name == name)
}

fn truthy(value: &CppValue) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        _ => true,
    }
}

fn default_value(ty: &Type) -> CppValue {
    match ty.base.first().map(String::as_str) {
        Some("int") => Value::Int(0),
        Some("float") | Some("double") => Value::Float(0.0),
        Some("bool") => Value::Bool(false),
        Some("char") => Value::Str(String::new()),
        _ => Value::Null,
    }
}

/// Stream rendering: booleans print as 1/0 like `std::cout` does.
fn cpp_str(value: &CppValue) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
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
    use polyglot_lang_core::DiagKind;

    fn run_src(src: &str) -> RunResult {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (unit, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        interpret(&unit, &AbortFlag::new())
    }

    fn stdout(src: &str) -> Vec<String> {
        let result = run_src(src);
        assert!(
            result.diagnostics.iter().all(|d| !d.is_error()),
            "runtime error: {:?}",
            result.diagnostics
        );
        result.stdout
    }

    #[test]
    fn test_cout_chain_with_endl() {
        let src = "#include <iostream>\nusing namespace std;\nint main() {\n    cout << \"x=\" << 7 << endl;\n    return 0;\n}\n";
        assert_eq!(stdout(src), vec!["x=7"]);
    }

    #[test]
    fn test_qualified_cout() {
        let src = "#include <iostream>\nint main() {\n    std::cout << 42 << std::endl;\n    return 0;\n}\n";
        assert_eq!(stdout(src), vec!["42"]);
    }

    #[test]
    fn test_function_call_and_arithmetic() {
        let src = "int add(int a, int b) { return a + b; }\nint main() { std::cout << add(2, 3) << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["5"]);
    }

    #[test]
    fn test_for_loop_accumulation() {
        let src = "int main() {\n    int t = 0;\n    for (int i = 1; i <= 4; i++) t += i;\n    std::cout << t << std::endl;\n    return 0;\n}\n";
        assert_eq!(stdout(src), vec!["10"]);
    }

    #[test]
    fn test_integer_division_truncates() {
        let src = "int main() { std::cout << 7 / 2 << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["3"]);
    }

    #[test]
    fn test_integer_division_by_zero_is_error() {
        let result = run_src("int main() { std::cout << 1 / 0; return 0; }\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::DivisionByZero));
    }

    #[test]
    fn test_float_division_by_zero_is_infinite() {
        let src = "int main() { std::cout << 1.0 / 0.0 << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["inf"]);
    }

    #[test]
    fn test_bool_prints_as_digit() {
        let src = "int main() { std::cout << (1 < 2) << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["1"]);
    }

    #[test]
    fn test_shift_still_works_on_integers() {
        let src = "int main() { int x = 1 << 4; std::cout << x << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["16"]);
    }

    #[test]
    fn test_cin_extraction_stub() {
        let src = "int main() { int x = 9; std::cin >> x; std::cout << x << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["0"]);
    }

    #[test]
    fn test_global_variable() {
        let src = "int counter = 3;\nint main() { std::cout << counter << std::endl; return 0; }\n";
        assert_eq!(stdout(src), vec!["3"]);
    }

    #[test]
    fn test_while_with_break() {
        let src = "int main() {\n    int i = 0;\n    while (true) { i++; if (i == 3) break; }\n    std::cout << i << std::endl;\n    return 0;\n}\n";
        assert_eq!(stdout(src), vec!["3"]);
    }
}
