//! Pascal interpreter — walks the program AST.
//!
//! Each routine call pushes a frame whose parent is the routine's
//! defining scope, so nested procedures see the variables of the
//! routine they are declared in. Function results are the classic
//! Pascal pattern: assignment to the function's own name.

use std::rc::Rc;

use polyglot_lang_core::{AbortFlag, Diagnostic, Span};
use polyglot_runtime::{Flow, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind, Value};

use crate::ast::{BinOp, Decl, DeclKind, Expr, ExprKind, Program, Routine, Stmt, StmtKind, UnaryOp};

/// A declared Pascal procedure or function.
#[derive(Debug)]
pub struct PasRoutine {
    pub routine: Routine,
    /// Defining scope — parent of every invocation frame.
    pub closure: ScopeId,
}

type PasValue = Value<PasRoutine>;

/// Result of executing a program.
#[derive(Debug)]
pub struct RunResult {
    pub stdout: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run a parsed program.
pub fn interpret(program: &Program, abort: &AbortFlag) -> RunResult {
    let mut interp = Interp::new(abort.clone());
    let outcome = interp.run(program);
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
    arena: ScopeArena<PasRoutine>,
    globals: ScopeId,
    out: Output,
    diags: Vec<Diagnostic>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<PasRoutine>, RuntimeError>;
type EvalResult = Result<PasValue, RuntimeError>;

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

    fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        self.install_decls(&program.decls, self.globals)?;
        self.exec_block(&program.body, self.globals)?;
        Ok(())
    }

    fn install_decls(&mut self, decls: &[Decl], scope: ScopeId) -> Result<(), RuntimeError> {
        for decl in decls {
            match &decl.kind {
                DeclKind::VarGroup { names, type_name } => {
                    let default = default_value(type_name);
                    for name in names {
                        self.arena.declare(
                            scope,
                            name.clone(),
                            default.clone(),
                            SymbolKind::Variable,
                        );
                    }
                }
                DeclKind::ConstDef { name, value } => {
                    let value = self.eval(value, scope)?;
                    self.arena.declare(scope, name.clone(), value, SymbolKind::Variable);
                }
                DeclKind::Routine(routine) => {
                    let value = Value::Function(Rc::new(PasRoutine {
                        routine: routine.clone(),
                        closure: scope,
                    }));
                    self.arena
                        .declare(scope, routine.name.clone(), value, SymbolKind::Function);
                }
            }
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
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                if !self.arena.assign(scope, target, value) {
                    return Err(RuntimeError::NameNotDefined {
                        name: target.clone(),
                        span: stmt.span,
                    });
                }
                Ok(Flow::Normal)
            }
            StmtKind::Call { name, args } => {
                self.call(name, args, scope, stmt.span)?;
                Ok(Flow::Normal)
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let test = self.eval_bool(cond, scope)?;
                if test {
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
                    if !self.eval_bool(cond, scope)? {
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
            StmtKind::For { var, from, to, downto, body } => {
                let from = self.eval_int(from, scope)?;
                let to = self.eval_int(to, scope)?;
                let mut i = from;
                loop {
                    if *downto { if i < to { break; } } else if i > to { break; }
                    if !self.arena.assign(scope, var, Value::Int(i)) {
                        return Err(RuntimeError::NameNotDefined {
                            name: var.clone(),
                            span: stmt.span,
                        });
                    }
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if *downto { i -= 1 } else { i += 1 }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Repeat { body, until } => {
                loop {
                    if self.abort.is_set() {
                        return Err(RuntimeError::Cancelled { span: stmt.span });
                    }
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if self.eval_bool(until, scope)? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Compound(body) => self.exec_block(body, scope),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Empty => Ok(Flow::Normal),
        }
    }

    // -- calls -----------------------------------------------------------

    fn call(&mut self, name: &str, args: &[Expr], scope: ScopeId, span: Span) -> EvalResult {
        if let Some(result) = self.call_builtin(name, args, scope, span)? {
            return Ok(result);
        }
        let value = match self.arena.lookup(scope, name) {
            Some(binding) => binding.value.clone(),
            None => {
                return Err(RuntimeError::NameNotDefined { name: name.to_string(), span });
            }
        };
        let routine = match value {
            Value::Function(routine) => routine,
            other => {
                return Err(RuntimeError::UncallableValue {
                    type_name: other.type_name().to_string(),
                    span,
                });
            }
        };
        if args.len() != routine.routine.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: routine.routine.params.len(),
                got: args.len(),
                span,
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        let frame = self.arena.push(Some(routine.closure));
        for (param, value) in routine.routine.params.iter().zip(values) {
            self.arena
                .declare(frame, param.name.clone(), value, SymbolKind::Parameter);
        }
        let is_function = routine.routine.return_type.is_some();
        if let Some(return_type) = &routine.routine.return_type {
            self.arena.declare(
                frame,
                routine.routine.name.clone(),
                default_value(return_type),
                SymbolKind::Variable,
            );
        }
        self.install_decls(&routine.routine.decls, frame)?;
        self.exec_block(&routine.routine.body, frame)?;

        if is_function {
            let result = self
                .arena
                .lookup(frame, &routine.routine.name)
                .map(|b| b.value.clone())
                .unwrap_or(Value::Null);
            Ok(result)
        } else {
            Ok(Value::Null)
        }
    }

    /// Console builtins. Returns `Ok(None)` when `name` is not one.
    fn call_builtin(
        &mut self,
        name: &str,
        args: &[Expr],
        scope: ScopeId,
        span: Span,
    ) -> Result<Option<PasValue>, RuntimeError> {
        match name {
            "write" => {
                for arg in args {
                    let value = self.eval(arg, scope)?;
                    let text = pas_str(&value);
                    self.out.write(&text);
                }
                Ok(Some(Value::Null))
            }
            "writeln" => {
                for arg in args {
                    let value = self.eval(arg, scope)?;
                    let text = pas_str(&value);
                    self.out.write(&text);
                }
                self.out.end_line();
                Ok(Some(Value::Null))
            }
            // Input builtins are read stubs: no blocking, variables get
            // their type defaults.
            "read" | "readln" => {
                let _ = (args, span);
                Ok(Some(Value::Null))
            }
            "readkey" => Ok(Some(Value::Str(String::new()))),
            "clrscr" => Ok(Some(Value::Null)),
            _ => Ok(None),
        }
    }

    // -- expressions -----------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Real(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Ident(name) => {
                let value = match self.arena.lookup(scope, name) {
                    Some(binding) => binding.value.clone(),
                    None => {
                        return Err(RuntimeError::NameNotDefined {
                            name: name.clone(),
                            span: expr.span,
                        })
                    }
                };
                // A bare function identifier is a zero-argument call in
                // expression position.
                match value {
                    Value::Function(routine) if routine.routine.return_type.is_some() => {
                        self.call(name, &[], scope, expr.span)
                    }
                    value => Ok(value),
                }
            }
            ExprKind::Call { name, args } => self.call(name, args, scope, expr.span),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!as_bool(&value, expr.span)?)),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(type_error("-", &other, expr.span)),
                    },
                    UnaryOp::Pos => match value {
                        Value::Int(_) | Value::Float(_) => Ok(value),
                        other => Err(type_error("+", &other, expr.span)),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left, scope)?;
                let rhs = self.eval(right, scope)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
        }
    }

    fn eval_bool(&mut self, expr: &Expr, scope: ScopeId) -> Result<bool, RuntimeError> {
        let value = self.eval(expr, scope)?;
        as_bool(&value, expr.span)
    }

    fn eval_int(&mut self, expr: &Expr, scope: ScopeId) -> Result<i64, RuntimeError> {
        let value = self.eval(expr, scope)?;
        value.as_int().ok_or_else(|| RuntimeError::TypeError {
            message: format!("expected an integer, got {}", value.type_name()),
            span: expr.span,
        })
    }

    fn binary(&mut self, op: BinOp, lhs: PasValue, rhs: PasValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            Add => match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                _ => self.arith(op, lhs, rhs, span),
            },
            Sub | Mul => self.arith(op, lhs, rhs, span),
            Divide => {
                let (a, b) = self.float_pair(&lhs, &rhs, "/", span)?;
                if b == 0.0 {
                    Err(RuntimeError::DivisionByZero { span })
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            IntDiv => {
                let (a, b) = self.int_pair(&lhs, &rhs, "div", span)?;
                if b == 0 {
                    Err(RuntimeError::DivisionByZero { span })
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            Mod => {
                let (a, b) = self.int_pair(&lhs, &rhs, "mod", span)?;
                if b == 0 {
                    Err(RuntimeError::DivisionByZero { span })
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            And => Ok(Value::Bool(as_bool(&lhs, span)? && as_bool(&rhs, span)?)),
            Or => Ok(Value::Bool(as_bool(&lhs, span)? || as_bool(&rhs, span)?)),
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
        }
    }

    fn arith(&mut self, op: BinOp, lhs: PasValue, rhs: PasValue, span: Span) -> EvalResult {
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    BinOp::Add => a.checked_add(*b),
                    BinOp::Sub => a.checked_sub(*b),
                    BinOp::Mul => a.checked_mul(*b),
                    _ => unreachable!(),
                };
                match result {
                    Some(n) => Ok(Value::Int(n)),
                    None => Err(RuntimeError::TypeError {
                        message: "integer overflow".to_string(),
                        span,
                    }),
                }
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
        lhs: &PasValue,
        rhs: &PasValue,
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

    fn int_pair(
        &self,
        lhs: &PasValue,
        rhs: &PasValue,
        op: &str,
        span: Span,
    ) -> Result<(i64, i64), RuntimeError> {
        match (lhs.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RuntimeError::TypeError {
                message: format!(
                    "operator '{op}' needs integer operands, got {} and {}",
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

fn default_value(type_name: &str) -> PasValue {
    match type_name {
        "integer" | "byte" | "word" | "longint" => Value::Int(0),
        "real" | "single" | "double" => Value::Float(0.0),
        "boolean" => Value::Bool(false),
        _ => Value::Str(String::new()),
    }
}

fn as_bool(value: &PasValue, span: Span) -> Result<bool, RuntimeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(RuntimeError::TypeError {
            message: format!("expected a boolean, got {}", other.type_name()),
            span,
        }),
    }
}

fn type_error(op: &str, value: &PasValue, span: Span) -> RuntimeError {
    RuntimeError::TypeError {
        message: format!("operator '{op}' is not applicable to {}", value.type_name()),
        span,
    }
}

/// Console rendering: booleans print in uppercase like Turbo Pascal.
fn pas_str(value: &PasValue) -> String {
    match value {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
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
        let (program, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        interpret(&program, &AbortFlag::new())
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
    fn test_writeln_scenario() {
        assert_eq!(
            stdout("program t; var x:integer; begin x := 7; writeln('x=', x); end."),
            vec!["x=7"]
        );
    }

    #[test]
    fn test_write_accumulates_until_writeln() {
        let src = "program p; begin write('a'); write('b'); writeln('c'); end.";
        assert_eq!(stdout(src), vec!["abc"]);
    }

    #[test]
    fn test_for_to_and_downto() {
        let src = "program p; var i: integer; begin for i := 1 to 3 do write(i); writeln(''); for i := 3 downto 1 do write(i); writeln(''); end.";
        assert_eq!(stdout(src), vec!["123", "321"]);
    }

    #[test]
    fn test_repeat_until() {
        let src = "program p; var i: integer; begin i := 0; repeat i := i + 1; write(i) until i >= 3; writeln(''); end.";
        assert_eq!(stdout(src), vec!["123"]);
    }

    #[test]
    fn test_function_result_via_name() {
        let src = "program p;\nfunction sq(n: integer): integer;\nbegin sq := n * n; end;\nbegin writeln(sq(4)); end.";
        assert_eq!(stdout(src), vec!["16"]);
    }

    #[test]
    fn test_nested_procedure_mutates_outer() {
        let src = "program p;\nvar g: integer;\nprocedure bump;\nbegin g := g + 1; end;\nbegin g := 0; bump; bump; writeln(g); end.";
        assert_eq!(stdout(src), vec!["2"]);
    }

    #[test]
    fn test_div_and_mod() {
        let src = "program p; begin writeln(7 div 2); writeln(7 mod 2); end.";
        assert_eq!(stdout(src), vec!["3", "1"]);
    }

    #[test]
    fn test_real_division() {
        assert_eq!(stdout("program p; begin writeln(7 / 2); end."), vec!["3.5"]);
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let result = run_src("program p; begin writeln(1 div 0); end.");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::DivisionByZero));
    }

    #[test]
    fn test_break_in_loop() {
        let src = "program p; var i: integer; begin for i := 1 to 9 do begin if i > 2 then break; write(i); end; writeln(''); end.";
        assert_eq!(stdout(src), vec!["12"]);
    }

    #[test]
    fn test_boolean_output() {
        assert_eq!(stdout("program p; begin writeln(1 < 2); end."), vec!["TRUE"]);
    }

    #[test]
    fn test_case_insensitive_execution() {
        assert_eq!(
            stdout("PROGRAM P; VAR X: INTEGER; BEGIN X := 2; WriteLn(X); END."),
            vec!["2"]
        );
    }

    #[test]
    fn test_const_section() {
        assert_eq!(
            stdout("program p; const max = 10; begin writeln(max); end."),
            vec!["10"]
        );
    }
}
