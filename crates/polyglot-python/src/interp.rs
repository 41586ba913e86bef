//! Python interpreter — walks the module AST.
//!
//! Scoping is module/function only (no block scopes); closures capture
//! their defining scope. Non-local exits bubble up as [`Flow`] values.

use std::collections::HashMap;
use std::rc::Rc;

use polyglot_lang_core::{AbortFlag, Diagnostic, Span};
use polyglot_runtime::{
    Builtin, Flow, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind, Value,
};

use crate::ast::{BinOp, Expr, ExprKind, Module, Stmt, StmtKind, UnaryOp};
use crate::check::BUILTINS;

/// A user-defined Python function.
#[derive(Debug)]
pub struct PyFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    /// Captured defining scope — parent of every call frame.
    pub closure: ScopeId,
}

type PyValue = Value<PyFunction>;

/// Result of executing a module.
#[derive(Debug)]
pub struct RunResult {
    /// Captured stdout, one chunk per print.
    pub stdout: Vec<String>,
    /// Runtime diagnostics (warnings plus at most one aborting error).
    pub diagnostics: Vec<Diagnostic>,
}

/// Run a parsed module.
pub fn interpret(module: &Module, abort: &AbortFlag) -> RunResult {
    let mut interp = Interp::new(abort.clone());
    let outcome = interp.exec_block(&module.body, interp.globals);
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
    arena: ScopeArena<PyFunction>,
    globals: ScopeId,
    out: Output,
    diags: Vec<Diagnostic>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<PyFunction>, RuntimeError>;
type EvalResult = Result<PyValue, RuntimeError>;

impl Interp {
    fn new(abort: AbortFlag) -> Self {
        let mut arena = ScopeArena::new();
        let globals = arena.push(None);
        for name in BUILTINS {
            arena.declare(
                globals,
                *name,
                Value::Builtin(Builtin { name: *name, arity: None }),
                SymbolKind::Builtin,
            );
        }
        Self {
            arena,
            globals,
            out: Output::new(),
            diags: Vec::new(),
            abort: abort.clone(),
        }
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
            StmtKind::FunctionDef { name, params, body } => {
                let function = Value::Function(Rc::new(PyFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    closure: scope,
                }));
                self.arena.declare(scope, name.clone(), function, SymbolKind::Function);
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    let test = self.eval(cond, scope)?;
                    if truthy(&test) {
                        return self.exec_block(body, scope);
                    }
                }
                self.exec_block(orelse, scope)
            }
            StmtKind::While { cond, body } => {
                loop {
                    let test = self.eval(cond, scope)?;
                    if !truthy(&test) {
                        break;
                    }
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter, scope)?;
                let items = iter_items(&iterable, iter.span)?;
                for item in items {
                    self.arena.declare(scope, target.clone(), item, SymbolKind::Variable);
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval(target, scope)?;
                let operand = self.eval(value, scope)?;
                let updated = self.binary(*op, current, operand, stmt.span)?;
                self.assign(target, updated, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::ExprStmt(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::Assert { test, detail } => {
                let value = self.eval(test, scope)?;
                if truthy(&value) {
                    Ok(Flow::Normal)
                } else {
                    let detail = match detail {
                        Some(expr) => Some(py_str(&self.eval(expr, scope)?)),
                        None => None,
                    };
                    Err(RuntimeError::AssertionFailed { detail, span: stmt.span })
                }
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Pass => Ok(Flow::Normal),
        }
    }

    fn assign(&mut self, target: &Expr, value: PyValue, scope: ScopeId) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Name(name) => {
                // Python: assignment binds in the current scope unless
                // an enclosing binding already exists there.
                if self.arena.declared_here(scope, name) {
                    self.arena.assign(scope, name, value);
                } else {
                    self.arena.declare(scope, name.clone(), value, SymbolKind::Variable);
                }
                Ok(())
            }
            ExprKind::Index { obj, index } => {
                let container = self.eval(obj, scope)?;
                let key = self.eval(index, scope)?;
                match container {
                    Value::List(items) => {
                        let mut items = items.borrow_mut();
                        let idx = list_index(&key, items.len(), target.span)?;
                        items[idx] = value;
                        Ok(())
                    }
                    Value::Map(entries) => {
                        entries.borrow_mut().insert(py_str(&key), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::TypeError {
                        message: format!("'{}' does not support item assignment", other.type_name()),
                        span: target.span,
                    }),
                }
            }
            ExprKind::Attr { .. } => Err(RuntimeError::TypeError {
                message: "attribute assignment is not supported".to_string(),
                span: target.span,
            }),
            _ => Err(RuntimeError::TypeError {
                message: "invalid assignment target".to_string(),
                span: target.span,
            }),
        }
    }

    // -- expressions -----------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::Null),
            ExprKind::Name(name) => match self.arena.lookup(scope, name) {
                Some(binding) => Ok(binding.value.clone()),
                None => Err(RuntimeError::NameNotDefined {
                    name: name.clone(),
                    span: expr.span,
                }),
            },
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Dict(entries) => {
                let mut map = HashMap::new();
                for (key, value) in entries {
                    let key = py_str(&self.eval(key, scope)?);
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        Value::Bool(b) => Ok(Value::Int(-i64::from(b))),
                        other => Err(RuntimeError::TypeError {
                            message: format!("bad operand type for unary -: '{}'", other.type_name()),
                            span: expr.span,
                        }),
                    },
                    UnaryOp::Pos => match value {
                        Value::Int(_) | Value::Float(_) => Ok(value),
                        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                        other => Err(RuntimeError::TypeError {
                            message: format!("bad operand type for unary +: '{}'", other.type_name()),
                            span: expr.span,
                        }),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => match op {
                BinOp::And => {
                    let lhs = self.eval(left, scope)?;
                    if !truthy(&lhs) {
                        return Ok(lhs);
                    }
                    self.eval(right, scope)
                }
                BinOp::Or => {
                    let lhs = self.eval(left, scope)?;
                    if truthy(&lhs) {
                        return Ok(lhs);
                    }
                    self.eval(right, scope)
                }
                _ => {
                    let lhs = self.eval(left, scope)?;
                    let rhs = self.eval(right, scope)?;
                    self.binary(*op, lhs, rhs, expr.span)
                }
            },
            ExprKind::Call { func, args } => {
                let callee = self.eval(func, scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call(callee, values, expr.span)
            }
            ExprKind::Index { obj, index } => {
                let container = self.eval(obj, scope)?;
                let key = self.eval(index, scope)?;
                match container {
                    Value::List(items) => {
                        let items = items.borrow();
                        let idx = list_index(&key, items.len(), expr.span)?;
                        Ok(items[idx].clone())
                    }
                    Value::Str(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        let idx = list_index(&key, chars.len(), expr.span)?;
                        Ok(Value::Str(chars[idx].to_string()))
                    }
                    Value::Map(entries) => {
                        let key = py_str(&key);
                        entries.borrow().get(&key).cloned().ok_or_else(|| {
                            RuntimeError::KeyNotFound { key, span: expr.span }
                        })
                    }
                    other => Err(RuntimeError::TypeError {
                        message: format!("'{}' is not subscriptable", other.type_name()),
                        span: expr.span,
                    }),
                }
            }
            ExprKind::Attr { obj, name } => {
                let value = self.eval(obj, scope)?;
                Err(RuntimeError::TypeError {
                    message: format!("'{}' has no attribute '{name}'", value.type_name()),
                    span: expr.span,
                })
            }
        }
    }

    fn call(&mut self, callee: PyValue, args: Vec<PyValue>, span: Span) -> EvalResult {
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
                for (param, arg) in function.params.iter().zip(args) {
                    self.arena.declare(frame, param.clone(), arg, SymbolKind::Parameter);
                }
                match self.exec_block(&function.body, frame)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Null),
                }
            }
            Value::Builtin(builtin) => self.call_builtin(builtin.name, args, span),
            other => Err(RuntimeError::UncallableValue {
                type_name: other.type_name().to_string(),
                span,
            }),
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<PyValue>, span: Span) -> EvalResult {
        match name {
            "print" => {
                let text = args.iter().map(py_str).collect::<Vec<_>>().join(" ");
                self.out.line(text);
                Ok(Value::Null)
            }
            "range" => {
                let ints: Vec<i64> = args
                    .iter()
                    .map(|v| {
                        v.as_int().ok_or_else(|| RuntimeError::TypeError {
                            message: "range() arguments must be integers".to_string(),
                            span,
                        })
                    })
                    .collect::<Result<_, _>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => {
                        return Err(RuntimeError::ArityMismatch {
                            name: "range".to_string(),
                            expected: 3,
                            got: ints.len(),
                            span,
                        })
                    }
                };
                if step == 0 {
                    return Err(RuntimeError::TypeError {
                        message: "range() step must not be zero".to_string(),
                        span,
                    });
                }
                let mut items = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    items.push(Value::Int(i));
                    i += step;
                }
                Ok(Value::list(items))
            }
            "len" => match args.as_slice() {
                [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
                [Value::List(items)] => Ok(Value::Int(items.borrow().len() as i64)),
                [Value::Map(entries)] => Ok(Value::Int(entries.borrow().len() as i64)),
                [other] => Err(RuntimeError::TypeError {
                    message: format!("object of type '{}' has no len()", other.type_name()),
                    span,
                }),
                _ => Err(RuntimeError::ArityMismatch {
                    name: "len".to_string(),
                    expected: 1,
                    got: args.len(),
                    span,
                }),
            },
            "int" => match args.as_slice() {
                [Value::Int(n)] => Ok(Value::Int(*n)),
                [Value::Float(x)] => Ok(Value::Int(*x as i64)),
                [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
                [Value::Str(s)] => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    RuntimeError::TypeError {
                        message: format!("invalid literal for int(): '{s}'"),
                        span,
                    }
                }),
                _ => Err(RuntimeError::TypeError {
                    message: "int() expects one number or string".to_string(),
                    span,
                }),
            },
            "float" => match args.as_slice() {
                [Value::Int(n)] => Ok(Value::Float(*n as f64)),
                [Value::Float(x)] => Ok(Value::Float(*x)),
                [Value::Str(s)] => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    RuntimeError::TypeError {
                        message: format!("could not convert string to float: '{s}'"),
                        span,
                    }
                }),
                _ => Err(RuntimeError::TypeError {
                    message: "float() expects one number or string".to_string(),
                    span,
                }),
            },
            "str" => match args.as_slice() {
                [value] => Ok(Value::Str(py_str(value))),
                _ => Ok(Value::Str(String::new())),
            },
            "bool" => match args.as_slice() {
                [value] => Ok(Value::Bool(truthy(value))),
                _ => Ok(Value::Bool(false)),
            },
            "list" => match args.as_slice() {
                [] => Ok(Value::list(Vec::new())),
                [value] => Ok(Value::list(iter_items(value, span)?)),
                _ => Err(RuntimeError::TypeError {
                    message: "list() expects at most one argument".to_string(),
                    span,
                }),
            },
            "dict" => Ok(Value::map(HashMap::new())),
            other => Err(RuntimeError::NameNotDefined {
                name: other.to_string(),
                span,
            }),
        }
    }

    // -- operators -------------------------------------------------------

    fn binary(&mut self, op: BinOp, lhs: PyValue, rhs: PyValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            Add => match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (Value::List(a), Value::List(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Value::list(items))
                }
                _ => self.numeric(op, lhs, rhs, span),
            },
            Mul => match (&lhs, &rhs) {
                (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                    Ok(Value::Str(s.repeat((*n).max(0) as usize)))
                }
                (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                    let mut out = Vec::new();
                    for _ in 0..(*n).max(0) {
                        out.extend(items.borrow().iter().cloned());
                    }
                    Ok(Value::list(out))
                }
                _ => self.numeric(op, lhs, rhs, span),
            },
            Sub | Div | FloorDiv | Mod | Pow => self.numeric(op, lhs, rhs, span),
            Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
            Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            Lt | Gt | Le | Ge => self.compare(op, lhs, rhs, span),
            BitAnd | BitOr | BitXor | Shl | Shr => {
                let (a, b) = match (lhs.as_int(), rhs.as_int()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(RuntimeError::TypeError {
                            message: format!(
                                "unsupported operand type(s) for {}",
                                op.symbol()
                            ),
                            span,
                        })
                    }
                };
                let result = match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    BitXor => a ^ b,
                    Shl => a.wrapping_shl(b.max(0) as u32),
                    Shr => a.wrapping_shr(b.max(0) as u32),
                    _ => unreachable!(),
                };
                Ok(Value::Int(result))
            }
            And | Or => unreachable!("short-circuit ops handled in eval"),
        }
    }

    fn numeric(&mut self, op: BinOp, lhs: PyValue, rhs: PyValue, span: Span) -> EvalResult {
        let type_error = |a: &PyValue, b: &PyValue| RuntimeError::TypeError {
            message: format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                a.type_name(),
                b.type_name()
            ),
            span,
        };
        // Booleans participate as 0/1.
        let widen = |v: &PyValue| match v {
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            Value::Int(_) | Value::Float(_) => Some(v.clone()),
            _ => None,
        };
        let (a, b) = match (widen(&lhs), widen(&rhs)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(type_error(&lhs, &rhs)),
        };

        match (a, b) {
            (Value::Int(x), Value::Int(y)) => match op {
                BinOp::Add => Ok(int_or_float(x.checked_add(y), x as f64 + y as f64)),
                BinOp::Sub => Ok(int_or_float(x.checked_sub(y), x as f64 - y as f64)),
                BinOp::Mul => Ok(int_or_float(x.checked_mul(y), x as f64 * y as f64)),
                BinOp::Div => {
                    if y == 0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Float(x as f64 / y as f64))
                    }
                }
                BinOp::FloorDiv => {
                    if y == 0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Int(x.div_euclid(y)))
                    }
                }
                BinOp::Mod => {
                    if y == 0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Int(py_mod_int(x, y)))
                    }
                }
                BinOp::Pow => {
                    if y >= 0 {
                        Ok(int_or_float(
                            x.checked_pow(y.min(u32::MAX as i64) as u32),
                            (x as f64).powf(y as f64),
                        ))
                    } else {
                        Ok(Value::Float((x as f64).powf(y as f64)))
                    }
                }
                _ => unreachable!(),
            },
            (a, b) => {
                let x = a.as_float().expect("widened to numeric");
                let y = b.as_float().expect("widened to numeric");
                match op {
                    BinOp::Add => Ok(Value::Float(x + y)),
                    BinOp::Sub => Ok(Value::Float(x - y)),
                    BinOp::Mul => Ok(Value::Float(x * y)),
                    BinOp::Div => {
                        if y == 0.0 {
                            Err(RuntimeError::DivisionByZero { span })
                        } else {
                            Ok(Value::Float(x / y))
                        }
                    }
                    BinOp::FloorDiv => {
                        if y == 0.0 {
                            Err(RuntimeError::DivisionByZero { span })
                        } else {
                            Ok(Value::Float((x / y).floor()))
                        }
                    }
                    BinOp::Mod => {
                        if y == 0.0 {
                            Err(RuntimeError::DivisionByZero { span })
                        } else {
                            Ok(Value::Float(x - y * (x / y).floor()))
                        }
                    }
                    BinOp::Pow => Ok(Value::Float(x.powf(y))),
                    _ => unreachable!(),
                }
            }
        }
    }

    fn compare(&mut self, op: BinOp, lhs: PyValue, rhs: PyValue, span: Span) -> EvalResult {
        let ordering = match (&lhs, &rhs) {
            (a, b) if a.is_numeric() && b.is_numeric() => a
                .as_float()
                .unwrap()
                .partial_cmp(&b.as_float().unwrap()),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        };
        let Some(ordering) = ordering else {
            // Incompatible comparison: false plus a warning, never a throw.
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
            BinOp::Lt => ordering == std::cmp::Ordering::Less,
            BinOp::Gt => ordering == std::cmp::Ordering::Greater,
            BinOp::Le => ordering != std::cmp::Ordering::Greater,
            BinOp::Ge => ordering != std::cmp::Ordering::Less,
            _ => unreachable!(),
        };
        Ok(Value::Bool(result))
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn int_or_float(checked: Option<i64>, fallback: f64) -> PyValue {
    match checked {
        Some(n) => Value::Int(n),
        None => Value::Float(fallback),
    }
}

fn py_mod_int(a: i64, b: i64) -> i64 {
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

fn truthy(value: &PyValue) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.borrow().is_empty(),
        Value::Map(entries) => !entries.borrow().is_empty(),
        _ => true,
    }
}

/// `str()` rendering used by `print`.
fn py_str(value: &PyValue) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => {
            if x.fract() == 0.0 && x.is_finite() {
                format!("{x:.1}")
            } else {
                x.to_string()
            }
        }
        Value::Str(s) => s.clone(),
        Value::List(items) => {
            let parts: Vec<String> = items.borrow().iter().map(py_repr).collect();
            format!("[{}]", parts.join(", "))
        }
        other => other.to_string(),
    }
}

/// `repr()` rendering used inside containers.
fn py_repr(value: &PyValue) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        other => py_str(other),
    }
}

fn iter_items(value: &PyValue, span: Span) -> Result<Vec<PyValue>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(entries) => Ok(entries
            .borrow()
            .keys()
            .map(|k| Value::Str(k.clone()))
            .collect()),
        other => Err(RuntimeError::TypeError {
            message: format!("'{}' object is not iterable", other.type_name()),
            span,
        }),
    }
}

fn list_index(key: &PyValue, len: usize, span: Span) -> Result<usize, RuntimeError> {
    let raw = key.as_int().ok_or_else(|| RuntimeError::TypeError {
        message: format!("indices must be integers, not '{}'", key.type_name()),
        span,
    })?;
    let idx = if raw < 0 { raw + len as i64 } else { raw };
    if idx < 0 || idx as usize >= len {
        Err(RuntimeError::IndexOutOfRange {
            index: raw,
            len,
            span,
        })
    } else {
        Ok(idx as usize)
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
        let (module, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        interpret(&module, &AbortFlag::new())
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
    fn test_function_call_scenario() {
        assert_eq!(
            stdout("def add(a,b):\n    return a+b\n\nprint(add(2,3))\n"),
            vec!["5"]
        );
    }

    #[test]
    fn test_while_loop_with_break() {
        let src = "i = 0\nwhile True:\n    i += 1\n    if i == 3:\n        break\nprint(i)\n";
        assert_eq!(stdout(src), vec!["3"]);
    }

    #[test]
    fn test_for_range_and_continue() {
        let src = "t = 0\nfor i in range(5):\n    if i == 2:\n        continue\n    t += i\nprint(t)\n";
        assert_eq!(stdout(src), vec!["8"]);
    }

    #[test]
    fn test_closure_captures_defining_scope() {
        let src = "def outer():\n    x = 10\n    def inner():\n        return x + 1\n    return inner()\n\nprint(outer())\n";
        assert_eq!(stdout(src), vec!["11"]);
    }

    #[test]
    fn test_recursion() {
        let src = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n\nprint(fact(5))\n";
        assert_eq!(stdout(src), vec!["120"]);
    }

    #[test]
    fn test_string_concat_and_repeat() {
        assert_eq!(stdout("print('ab' + 'cd')\nprint('ab' * 3)\n"), vec!["abcd", "ababab"]);
    }

    #[test]
    fn test_str_plus_num_is_type_error() {
        let result = run_src("print('a' + 1)\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::TypeError));
    }

    #[test]
    fn test_true_division_yields_float() {
        assert_eq!(stdout("print(7 / 2)\nprint(7 // 2)\n"), vec!["3.5", "3"]);
    }

    #[test]
    fn test_division_by_zero_aborts() {
        let result = run_src("print(1)\nprint(1 / 0)\nprint(2)\n");
        assert_eq!(result.stdout, vec!["1"], "output truncates at the abort");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::DivisionByZero));
    }

    #[test]
    fn test_negative_modulo_follows_divisor() {
        assert_eq!(stdout("print(-7 % 3)\n"), vec!["2"]);
    }

    #[test]
    fn test_list_index_and_mutation() {
        let src = "xs = [1, 2, 3]\nxs[1] = 20\nprint(xs[1])\nprint(xs[-1])\nprint(len(xs))\n";
        assert_eq!(stdout(src), vec!["20", "3", "3"]);
    }

    #[test]
    fn test_index_out_of_range() {
        let result = run_src("xs = [1]\nprint(xs[5])\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::IndexOutOfRange));
    }

    #[test]
    fn test_dict_access() {
        let src = "d = {'a': 1}\nd['b'] = 2\nprint(d['a'] + d['b'])\n";
        assert_eq!(stdout(src), vec!["3"]);
    }

    #[test]
    fn test_incompatible_comparison_warns_false() {
        let result = run_src("print(1 < 'a')\n");
        assert_eq!(result.stdout, vec!["False"]);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.severity == polyglot_lang_core::Severity::Warning));
    }

    #[test]
    fn test_assert_failure() {
        let result = run_src("assert 1 == 2, 'math broke'\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::AssertionFailed && d.message.contains("math broke")));
    }

    #[test]
    fn test_print_multiple_args() {
        assert_eq!(stdout("print(1, 'two', True)\n"), vec!["1 two True"]);
    }

    #[test]
    fn test_abort_between_statements() {
        let abort = AbortFlag::new();
        abort.set();
        let (tokens, _) = lex("print(1)\n");
        let (module, _) = parse(&tokens, &AbortFlag::new());
        let result = interpret(&module, &abort);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::Cancelled));
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        assert_eq!(stdout("print(0 or 'fallback')\nprint(1 and 2)\n"), vec!["fallback", "2"]);
    }
}
