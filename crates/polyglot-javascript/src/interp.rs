//! JavaScript interpreter — walks the program AST.
//!
//! Closures capture their defining scope; `this` is an ordinary
//! binding installed in method call frames, so arrow functions see the
//! enclosing `this` lexically. Number semantics follow the host float
//! tower: division never raises, it yields `Infinity`/`NaN`.

use std::collections::HashMap;
use std::rc::Rc;

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};
use polyglot_runtime::{
    Builtin, ClassDef, Flow, Instance, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind,
    Value,
};

use crate::ast::{
    ArrowBody, BinOp, Expr, ExprKind, MemberProp, Program, Stmt, StmtKind, TemplateElem, UnaryOp,
};

/// A user-defined JavaScript function, method, or arrow.
#[derive(Debug)]
pub struct JsFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: FnBody,
    pub closure: ScopeId,
}

#[derive(Debug)]
pub enum FnBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

type JsValue = Value<JsFunction>;

/// Result of executing a program.
#[derive(Debug)]
pub struct RunResult {
    pub stdout: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run a parsed program.
pub fn interpret(program: &Program, abort: &AbortFlag) -> RunResult {
    let mut interp = Interp::new(abort.clone());
    let outcome = interp.exec_block(&program.body, interp.globals);
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
    arena: ScopeArena<JsFunction>,
    globals: ScopeId,
    out: Output,
    diags: Vec<Diagnostic>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<JsFunction>, RuntimeError>;
type EvalResult = Result<JsValue, RuntimeError>;

impl Interp {
    fn new(abort: AbortFlag) -> Self {
        let mut arena = ScopeArena::new();
        let globals = arena.push(None);
        let mut console = HashMap::new();
        console.insert(
            "log".to_string(),
            Value::Builtin(Builtin { name: "console.log", arity: None }),
        );
        arena.declare(globals, "console", Value::map(console), SymbolKind::Builtin);
        arena.declare(globals, "NaN", Value::Float(f64::NAN), SymbolKind::Builtin);
        arena.declare(
            globals,
            "Infinity",
            Value::Float(f64::INFINITY),
            SymbolKind::Builtin,
        );
        arena.declare(globals, "undefined", Value::Null, SymbolKind::Builtin);
        Self {
            arena,
            globals,
            out: Output::new(),
            diags: Vec::new(),
            abort,
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
            StmtKind::VarDecl { name, init, .. } => {
                let value = match init {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Null,
                };
                self.arena.declare(scope, name.clone(), value, SymbolKind::Variable);
                Ok(Flow::Normal)
            }
            StmtKind::FunctionDecl { name, params, body } => {
                let function = Value::Function(Rc::new(JsFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: FnBody::Block(body.clone()),
                    closure: scope,
                }));
                self.arena.declare(scope, name.clone(), function, SymbolKind::Function);
                Ok(Flow::Normal)
            }
            StmtKind::ClassDecl { name, methods } => {
                let mut table = HashMap::new();
                for method in methods {
                    table.insert(
                        method.name.clone(),
                        Rc::new(JsFunction {
                            name: format!("{name}.{}", method.name),
                            params: method.params.clone(),
                            body: FnBody::Block(method.body.clone()),
                            closure: scope,
                        }),
                    );
                }
                let class = Value::Class(Rc::new(ClassDef {
                    name: name.clone(),
                    methods: table,
                }));
                self.arena.declare(scope, name.clone(), class, SymbolKind::Class);
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
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
            StmtKind::ForEach { name, of_loop, subject, body, .. } => {
                let subject = self.eval(subject, scope)?;
                let items = if *of_loop {
                    iter_values(&subject, stmt.span)?
                } else {
                    iter_keys(&subject)
                };
                let loop_scope = self.arena.push(Some(scope));
                for item in items {
                    self.arena
                        .declare(loop_scope, name.clone(), item, SymbolKind::Variable);
                    match self.exec_stmt(body, loop_scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Block(body) => {
                // A nested scope only matters when the block declares.
                let needs_scope = body.iter().any(|s| {
                    matches!(
                        s.kind,
                        StmtKind::VarDecl { .. }
                            | StmtKind::FunctionDecl { .. }
                            | StmtKind::ClassDecl { .. }
                    )
                });
                let inner = if needs_scope {
                    self.arena.push(Some(scope))
                } else {
                    scope
                };
                self.exec_block(body, inner)
            }
            StmtKind::ExprStmt(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
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
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null | ExprKind::Undefined => Ok(Value::Null),
            ExprKind::This => match self.arena.lookup(scope, "this") {
                Some(binding) => Ok(binding.value.clone()),
                None => Ok(Value::Null),
            },
            ExprKind::Ident(name) => match self.arena.lookup(scope, name) {
                Some(binding) => Ok(binding.value.clone()),
                None => Err(RuntimeError::NameNotDefined {
                    name: name.clone(),
                    span: expr.span,
                }),
            },
            ExprKind::Template(elems) => {
                let mut text = String::new();
                for elem in elems {
                    match elem {
                        TemplateElem::Text(t) => text.push_str(t),
                        TemplateElem::Interp(inner) => {
                            let value = self.eval(inner, scope)?;
                            text.push_str(&js_str(&value));
                        }
                    }
                }
                Ok(Value::Str(text))
            }
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Object(props) => {
                let mut map = HashMap::new();
                for (key, value) in props {
                    map.insert(key.clone(), self.eval(value, scope)?);
                }
                Ok(Value::map(map))
            }
            ExprKind::Arrow { params, body } => {
                let body = match body {
                    ArrowBody::Expr(inner) => FnBody::Expr((**inner).clone()),
                    ArrowBody::Block(stmts) => FnBody::Block(stmts.clone()),
                };
                Ok(Value::Function(Rc::new(JsFunction {
                    name: "<arrow>".to_string(),
                    params: params.clone(),
                    body,
                    closure: scope,
                })))
            }
            ExprKind::FunctionExpr { params, body } => Ok(Value::Function(Rc::new(JsFunction {
                name: "<anonymous>".to_string(),
                params: params.clone(),
                body: FnBody::Block(body.clone()),
                closure: scope,
            }))),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Value::Int(-n),
                        other => Value::Float(-to_number(&other)),
                    },
                    UnaryOp::Pos => match value {
                        Value::Int(n) => Value::Int(n),
                        other => Value::Float(to_number(&other)),
                    },
                })
            }
            ExprKind::Update { inc, prefix, target } => {
                let old = self.eval(target, scope)?;
                let delta = if *inc { 1.0 } else { -1.0 };
                let new = match old {
                    Value::Int(n) => Value::Int(if *inc { n + 1 } else { n - 1 }),
                    ref other => Value::Float(to_number(other) + delta),
                };
                self.write_target(target, new.clone(), scope)?;
                Ok(if *prefix { new } else { old })
            }
            ExprKind::Logical { and, left, right } => {
                let lhs = self.eval(left, scope)?;
                if *and {
                    if !truthy(&lhs) {
                        return Ok(lhs);
                    }
                } else if truthy(&lhs) {
                    return Ok(lhs);
                }
                self.eval(right, scope)
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                let test = self.eval(test, scope)?;
                if truthy(&test) {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left, scope)?;
                let rhs = self.eval(right, scope)?;
                self.binary(*op, lhs, rhs, expr.span)
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
                self.call(callee_value, values, expr.span)
            }
            ExprKind::New { callee, args } => {
                let class_value = self.eval(callee, scope)?;
                let Value::Class(class) = class_value else {
                    return Err(RuntimeError::TypeError {
                        message: "new target is not a class".to_string(),
                        span: expr.span,
                    });
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                let instance = Rc::new(std::cell::RefCell::new(Instance::new(Rc::clone(&class))));
                if let Some(ctor) = class.method("constructor") {
                    self.call_method(Rc::clone(&instance), ctor, values)?;
                }
                Ok(Value::Instance(instance))
            }
            ExprKind::Member { obj, prop } => {
                let value = self.eval(obj, scope)?;
                let key = self.member_key(prop, scope)?;
                self.member_read(&value, &key, expr.span)
            }
        }
    }

    fn member_key(&mut self, prop: &MemberProp, scope: ScopeId) -> Result<String, RuntimeError> {
        match prop {
            MemberProp::Named(name) => Ok(name.clone()),
            MemberProp::Computed(index) => {
                let value = self.eval(index, scope)?;
                Ok(js_str(&value))
            }
        }
    }

    fn member_read(&mut self, value: &JsValue, key: &str, span: Span) -> EvalResult {
        match value {
            Value::Map(entries) => Ok(entries.borrow().get(key).cloned().unwrap_or(Value::Null)),
            Value::List(items) => {
                if key == "length" {
                    return Ok(Value::Int(items.borrow().len() as i64));
                }
                match key.parse::<usize>() {
                    Ok(idx) => Ok(items.borrow().get(idx).cloned().unwrap_or(Value::Null)),
                    Err(_) => Ok(Value::Null),
                }
            }
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Int(s.chars().count() as i64));
                }
                match key.parse::<usize>() {
                    Ok(idx) => Ok(s
                        .chars()
                        .nth(idx)
                        .map(|c| Value::Str(c.to_string()))
                        .unwrap_or(Value::Null)),
                    Err(_) => Ok(Value::Null),
                }
            }
            Value::Instance(instance) => {
                // Fields first, then the class method table.
                if let Some(field) = instance.borrow().fields.get(key) {
                    return Ok(field.clone());
                }
                let method = instance.borrow().class.method(key);
                match method {
                    Some(method) => Ok(Value::BoundMethod {
                        receiver: Rc::clone(instance),
                        method,
                    }),
                    None => Ok(Value::Null),
                }
            }
            other => Err(RuntimeError::TypeError {
                message: format!("cannot read property '{key}' of {}", other.type_name()),
                span,
            }),
        }
    }

    fn write_target(
        &mut self,
        target: &Expr,
        value: JsValue,
        scope: ScopeId,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                if !self.arena.assign(scope, name, value.clone()) {
                    // Implicit global, matching the checker's tolerance.
                    self.arena
                        .declare(self.globals, name.clone(), value, SymbolKind::Variable);
                }
                Ok(())
            }
            ExprKind::Member { obj, prop } => {
                let container = self.eval(obj, scope)?;
                let key = self.member_key(prop, scope)?;
                match container {
                    Value::Map(entries) => {
                        entries.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    Value::List(items) => {
                        if let Ok(idx) = key.parse::<usize>() {
                            let mut items = items.borrow_mut();
                            if idx >= items.len() {
                                items.resize(idx + 1, Value::Null);
                            }
                            items[idx] = value;
                            Ok(())
                        } else {
                            Err(RuntimeError::TypeError {
                                message: format!("invalid array index '{key}'"),
                                span: target.span,
                            })
                        }
                    }
                    Value::Instance(instance) => {
                        instance.borrow_mut().fields.insert(key, value);
                        Ok(())
                    }
                    other => Err(RuntimeError::TypeError {
                        message: format!("cannot set property on {}", other.type_name()),
                        span: target.span,
                    }),
                }
            }
            _ => Err(RuntimeError::TypeError {
                message: "invalid assignment target".to_string(),
                span: target.span,
            }),
        }
    }

    // -- calls -----------------------------------------------------------

    fn call(&mut self, callee: JsValue, args: Vec<JsValue>, span: Span) -> EvalResult {
        match callee {
            Value::Function(function) => self.call_function(&function, None, args),
            Value::BoundMethod { receiver, method } => self.call_method(receiver, method, args),
            Value::Builtin(builtin) => match builtin.name {
                "console.log" => {
                    let text = args.iter().map(js_str).collect::<Vec<_>>().join(" ");
                    self.out.line(text);
                    Ok(Value::Null)
                }
                other => Err(RuntimeError::NameNotDefined {
                    name: other.to_string(),
                    span,
                }),
            },
            other => Err(RuntimeError::UncallableValue {
                type_name: other.type_name().to_string(),
                span,
            }),
        }
    }

    fn call_method(
        &mut self,
        receiver: Rc<std::cell::RefCell<Instance<JsFunction>>>,
        method: Rc<JsFunction>,
        args: Vec<JsValue>,
    ) -> EvalResult {
        self.call_function(&method, Some(Value::Instance(receiver)), args)
    }

    fn call_function(
        &mut self,
        function: &Rc<JsFunction>,
        this: Option<JsValue>,
        args: Vec<JsValue>,
    ) -> EvalResult {
        let frame = self.arena.push(Some(function.closure));
        if let Some(this) = this {
            self.arena.declare(frame, "this", this, SymbolKind::Variable);
        }
        for (i, param) in function.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Null);
            self.arena.declare(frame, param.clone(), value, SymbolKind::Parameter);
        }
        match &function.body {
            FnBody::Expr(expr) => self.eval(expr, frame),
            FnBody::Block(body) => match self.exec_block(body, frame)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Null),
            },
        }
    }

    // -- operators -------------------------------------------------------

    fn binary(&mut self, op: BinOp, lhs: JsValue, rhs: JsValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            Add => {
                if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                    return Ok(Value::Str(format!("{}{}", js_str(&lhs), js_str(&rhs))));
                }
                match (&lhs, &rhs) {
                    (Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
                        Some(n) => Ok(Value::Int(n)),
                        None => Ok(Value::Float(*a as f64 + *b as f64)),
                    },
                    _ => Ok(Value::Float(to_number(&lhs) + to_number(&rhs))),
                }
            }
            Sub => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => match a.checked_sub(*b) {
                    Some(n) => Ok(Value::Int(n)),
                    None => Ok(Value::Float(*a as f64 - *b as f64)),
                },
                _ => Ok(Value::Float(to_number(&lhs) - to_number(&rhs))),
            },
            Mul => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => match a.checked_mul(*b) {
                    Some(n) => Ok(Value::Int(n)),
                    None => Ok(Value::Float(*a as f64 * *b as f64)),
                },
                _ => Ok(Value::Float(to_number(&lhs) * to_number(&rhs))),
            },
            // Division is always float: 1/0 is Infinity, 0/0 is NaN.
            Div => Ok(Value::Float(to_number(&lhs) / to_number(&rhs))),
            Mod => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) if *b != 0 => Ok(Value::Int(a % b)),
                _ => Ok(Value::Float(to_number(&lhs) % to_number(&rhs))),
            },
            Pow => {
                let result = to_number(&lhs).powf(to_number(&rhs));
                match (&lhs, &rhs) {
                    (Value::Int(_), Value::Int(_)) if result.fract() == 0.0 && result.is_finite() => {
                        Ok(Value::Int(result as i64))
                    }
                    _ => Ok(Value::Float(result)),
                }
            }
            Lt | Gt | Le | Ge => self.compare(op, lhs, rhs, span),
            EqLoose => Ok(Value::Bool(loose_equals(&lhs, &rhs))),
            NeLoose => Ok(Value::Bool(!loose_equals(&lhs, &rhs))),
            EqStrict => Ok(Value::Bool(strict_equals(&lhs, &rhs))),
            NeStrict => Ok(Value::Bool(!strict_equals(&lhs, &rhs))),
            BitAnd | BitOr | BitXor | Shl | Shr => {
                let a = to_number(&lhs) as i64 as i32;
                let b = to_number(&rhs) as i64 as i32;
                let result = match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    BitXor => a ^ b,
                    Shl => a.wrapping_shl(b as u32 & 31),
                    Shr => a.wrapping_shr(b as u32 & 31),
                    _ => unreachable!(),
                };
                Ok(Value::Int(result as i64))
            }
        }
    }

    fn compare(&mut self, op: BinOp, lhs: JsValue, rhs: JsValue, span: Span) -> EvalResult {
        if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
            let result = match op {
                BinOp::Lt => a < b,
                BinOp::Gt => a > b,
                BinOp::Le => a <= b,
                BinOp::Ge => a >= b,
                _ => unreachable!(),
            };
            return Ok(Value::Bool(result));
        }
        if comparable(&lhs) && comparable(&rhs) {
            let (a, b) = (to_number(&lhs), to_number(&rhs));
            let result = match op {
                BinOp::Lt => a < b,
                BinOp::Gt => a > b,
                BinOp::Le => a <= b,
                BinOp::Ge => a >= b,
                _ => unreachable!(),
            };
            return Ok(Value::Bool(result));
        }
        self.diags.push(Diagnostic::warning(
            Stage::Run,
            DiagKind::TypeError,
            format!(
                "comparison between '{}' and '{}' is always false",
                lhs.type_name(),
                rhs.type_name()
            ),
            span,
        ));
        Ok(Value::Bool(false))
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn comparable(value: &JsValue) -> bool {
    matches!(
        value,
        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Str(_)
    )
}

fn truthy(value: &JsValue) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0 && !x.is_nan(),
        Value::Str(s) => !s.is_empty(),
        _ => true,
    }
}

/// JS numeric conversion: `true` is 1, `undefined` is NaN, strings
/// parse or go NaN, the empty string is 0.
fn to_number(value: &JsValue) -> f64 {
    match value {
        Value::Null => f64::NAN,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

fn loose_equals(lhs: &JsValue, rhs: &JsValue) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::List(_), _) | (_, Value::List(_)) | (Value::Map(_), _) | (_, Value::Map(_)) => {
            lhs.loose_eq(rhs)
        }
        _ => {
            let (a, b) = (to_number(lhs), to_number(rhs));
            a == b
        }
    }
}

fn strict_equals(lhs: &JsValue, rhs: &JsValue) -> bool {
    match (lhs, rhs) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            to_number(lhs) == to_number(rhs)
        }
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => lhs.loose_eq(rhs),
    }
}

/// `String(value)` semantics used by `console.log` and templates.
fn js_str(value: &JsValue) -> String {
    match value {
        Value::Null => "undefined".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => {
            if x.is_nan() {
                "NaN".to_string()
            } else if x.is_infinite() {
                if *x > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
            } else if x.fract() == 0.0 && x.abs() < 1e21 {
                format!("{}", *x as i64)
            } else {
                x.to_string()
            }
        }
        Value::Str(s) => s.clone(),
        Value::List(items) => items
            .borrow()
            .iter()
            .map(js_str)
            .collect::<Vec<_>>()
            .join(","),
        Value::Map(_) => "[object Object]".to_string(),
        Value::Instance(instance) => format!("[object {}]", instance.borrow().class.name),
        Value::Class(class) => format!("[class {}]", class.name),
        Value::Function(_) | Value::BoundMethod { .. } | Value::Builtin(_) => {
            "[function]".to_string()
        }
    }
}

fn iter_values(value: &JsValue, span: Span) -> Result<Vec<JsValue>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(RuntimeError::TypeError {
            message: format!("{} is not iterable", other.type_name()),
            span,
        }),
    }
}

fn iter_keys(value: &JsValue) -> Vec<JsValue> {
    match value {
        Value::List(items) => (0..items.borrow().len())
            .map(|i| Value::Str(i.to_string()))
            .collect(),
        Value::Map(entries) => entries
            .borrow()
            .keys()
            .map(|k| Value::Str(k.clone()))
            .collect(),
        _ => Vec::new(),
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
    fn test_for_loop_scenario() {
        assert_eq!(
            stdout("let t = 0;\nfor (let i=1; i<=4; i++) t += i;\nconsole.log(t);\n"),
            vec!["10"]
        );
    }

    #[test]
    fn test_plus_concatenates_with_string() {
        assert_eq!(stdout("console.log('n=' + 5);\nconsole.log(1 + 2);\n"), vec!["n=5", "3"]);
    }

    #[test]
    fn test_division_yields_infinity_and_nan() {
        assert_eq!(
            stdout("console.log(1 / 0);\nconsole.log(-1 / 0);\nconsole.log(0 / 0);\n"),
            vec!["Infinity", "-Infinity", "NaN"]
        );
    }

    #[test]
    fn test_numeric_coercion_of_bools_and_strings() {
        assert_eq!(stdout("console.log(true + 1);\nconsole.log('3' * 2);\n"), vec!["2", "6"]);
    }

    #[test]
    fn test_closures() {
        let src = "function counter() { let n = 0; return () => { n += 1; return n; }; }\nconst c = counter();\nc();\nconsole.log(c());\n";
        assert_eq!(stdout(src), vec!["2"]);
    }

    #[test]
    fn test_class_instance_and_this() {
        let src = "class Point {\n  constructor(x, y) { this.x = x; this.y = y; }\n  sum() { return this.x + this.y; }\n}\nconst p = new Point(3, 4);\nconsole.log(p.sum());\n";
        assert_eq!(stdout(src), vec!["7"]);
    }

    #[test]
    fn test_method_table_fallback_and_field_priority() {
        let src = "class A {\n  constructor() { this.kind = 'field'; }\n  kindOf() { return this.kind; }\n}\nconst a = new A();\nconsole.log(a.kindOf());\n";
        assert_eq!(stdout(src), vec!["field"]);
    }

    #[test]
    fn test_template_literal() {
        assert_eq!(stdout("let n = 6;\nconsole.log(`sum: ${n * 7}`);\n"), vec!["sum: 42"]);
    }

    #[test]
    fn test_array_length_and_mutation() {
        let src = "let xs = [1, 2];\nxs[2] = 9;\nconsole.log(xs.length);\nconsole.log(xs[2]);\n";
        assert_eq!(stdout(src), vec!["3", "9"]);
    }

    #[test]
    fn test_object_member_missing_is_undefined() {
        assert_eq!(stdout("let o = {a: 1};\nconsole.log(o.b);\n"), vec!["undefined"]);
    }

    #[test]
    fn test_loose_vs_strict_equality() {
        assert_eq!(
            stdout("console.log(1 == '1');\nconsole.log(1 === '1');\n"),
            vec!["true", "false"]
        );
    }

    #[test]
    fn test_ternary() {
        assert_eq!(stdout("let x = 5;\nconsole.log(x > 3 ? 'big' : 'small');\n"), vec!["big"]);
    }

    #[test]
    fn test_for_of_and_break() {
        let src = "for (const x of [1, 2, 3, 4]) {\n  if (x === 3) break;\n  console.log(x);\n}\n";
        assert_eq!(stdout(src), vec!["1", "2"]);
    }

    #[test]
    fn test_uncallable_value() {
        let result = run_src("let x = 5;\nx();\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::UncallableValue));
    }

    #[test]
    fn test_stdout_truncates_on_error() {
        let result = run_src("console.log('one');\nmissing();\nconsole.log('two');\n");
        assert_eq!(result.stdout, vec!["one"]);
        assert!(result.diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn test_array_prints_with_commas() {
        assert_eq!(stdout("console.log([1, 2, 3]);\n"), vec!["1,2,3"]);
    }
}
