//! PL/SQL interpreter — walks the script AST.
//!
//! Blocks push a scope per block; exception sections intercept
//! `RAISE` flows and the simulated predefined errors (`ZERO_DIVIDE`,
//! `VALUE_ERROR`). SQL statements execute against the shared
//! in-memory catalog; `SELECT` without `INTO` renders the fixed-width
//! grid into captured stdout.

use polyglot_lang_core::{AbortFlag, Diagnostic, Span};
use polyglot_runtime::{Flow, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind, Value};
use polyglot_sql::{render_table, Catalog, Column, SqlValue};

use crate::ast::{
    BinOp, Block, Expr, ExprKind, ItemKind, Projection, Script, SqlStmt, Stmt, StmtKind, UnaryOp,
};

/// PL/SQL's subset has no user-defined callables; this is the function
/// representation slot required by the shared value type.
#[derive(Debug)]
pub enum PlRoutine {}

type PlValue = Value<PlRoutine>;

/// Fixed SYSDATE placeholder so runs are deterministic.
pub const SYSDATE_TEXT: &str = "2024-01-01 00:00:00";

/// Result of executing a script.
#[derive(Debug)]
pub struct RunResult {
    pub stdout: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run a parsed script.
pub fn interpret(script: &Script, abort: &AbortFlag) -> RunResult {
    let mut interp = Interp::new(abort.clone());
    let mut diagnostics = Vec::new();
    'items: for item in &script.items {
        if interp.abort.is_set() {
            diagnostics.push(
                RuntimeError::Cancelled { span: item.span }.to_diagnostic(),
            );
            break;
        }
        let outcome = match &item.kind {
            ItemKind::Block(block) => interp.exec_top_block(block, item.span),
            ItemKind::Sql(sql) => interp.exec_sql(sql, item.span).map(|_| ()),
        };
        diagnostics.append(&mut interp.diags);
        if let Err(err) = outcome {
            diagnostics.push(err.to_diagnostic());
            break 'items;
        }
    }
    diagnostics.append(&mut interp.diags);
    RunResult {
        stdout: interp.out.finish(),
        diagnostics,
    }
}

struct Interp {
    arena: ScopeArena<PlRoutine>,
    catalog: Catalog,
    out: Output,
    diags: Vec<Diagnostic>,
    /// (code, message) of the error being handled, for SQLCODE/SQLERRM.
    current_error: Option<(i64, String)>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<PlRoutine>, RuntimeError>;
type EvalResult = Result<PlValue, RuntimeError>;

impl Interp {
    fn new(abort: AbortFlag) -> Self {
        Self {
            arena: ScopeArena::new(),
            catalog: Catalog::new(),
            out: Output::new(),
            diags: Vec::new(),
            current_error: None,
            abort,
        }
    }

    /// Run a top-level block; an unhandled exception aborts the script.
    fn exec_top_block(&mut self, block: &Block, span: Span) -> Result<(), RuntimeError> {
        match self.exec_block(block, None)? {
            Flow::Raise { name, message } => Err(RuntimeError::UserException {
                name,
                message,
                span,
            }),
            _ => Ok(()),
        }
    }

    /// Run one block with its own scope and exception section.
    fn exec_block(&mut self, block: &Block, parent: Option<ScopeId>) -> ExecResult {
        let scope = self.arena.push(parent);
        for decl in &block.decls {
            let value = match &decl.init {
                Some(init) => self.eval(init, scope)?,
                None => Value::Null,
            };
            self.arena.declare(scope, decl.name.clone(), value, SymbolKind::Variable);
        }

        let outcome = self.exec_stmts(&block.body, scope);

        // The exception section intercepts RAISE flows and the
        // simulated predefined errors.
        let raised: Option<(String, String, i64)> = match &outcome {
            Ok(Flow::Raise { name, message }) => {
                Some((name.clone(), message.clone(), user_error_code(name)))
            }
            Err(err) => simulated_exception(err).map(|name| {
                (name.to_string(), err.to_string(), predefined_code(name))
            }),
            _ => None,
        };

        if let Some((name, message, code)) = raised {
            if let Some(handler) = block
                .handlers
                .iter()
                .find(|h| h.names.iter().any(|n| n == &name) || h.names.is_empty())
            {
                let saved = self.current_error.replace((code, message));
                let result = self.exec_stmts(&handler.body, scope);
                // A bare RAISE inside the handler re-raises `name`.
                let result = match result {
                    Ok(Flow::Raise { name: inner, message }) if inner.is_empty() => {
                        Ok(Flow::Raise { name, message })
                    }
                    other => other,
                };
                self.current_error = saved;
                return result;
            }
        }
        outcome
    }

    fn exec_stmts(&mut self, body: &[Stmt], scope: ScopeId) -> ExecResult {
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
                let joined = name.join(".");
                match joined.as_str() {
                    "DBMS_OUTPUT.PUT_LINE" => {
                        let mut text = String::new();
                        for arg in args {
                            let value = self.eval(arg, scope)?;
                            text.push_str(&pl_str(&value));
                        }
                        self.out.line(text);
                        Ok(Flow::Normal)
                    }
                    "RAISE_APPLICATION_ERROR" => {
                        let code = match args.first() {
                            Some(expr) => self
                                .eval(expr, scope)?
                                .as_int()
                                .unwrap_or(-20000),
                            None => -20000,
                        };
                        let message = match args.get(1) {
                            Some(expr) => pl_str(&self.eval(expr, scope)?),
                            None => String::new(),
                        };
                        Ok(Flow::Raise {
                            name: format!("ORA{code}"),
                            message,
                        })
                    }
                    other => Err(RuntimeError::NameNotDefined {
                        name: other.to_string(),
                        span: stmt.span,
                    }),
                }
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval_bool(cond, scope)? {
                        return self.exec_stmts(body, scope);
                    }
                }
                self.exec_stmts(orelse, scope)
            }
            StmtKind::Loop { body } => loop {
                if self.abort.is_set() {
                    return Err(RuntimeError::Cancelled { span: stmt.span });
                }
                match self.exec_stmts(body, scope)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Continue | Flow::Normal => {}
                    flow => return Ok(flow),
                }
            },
            StmtKind::While { cond, body } => {
                loop {
                    if self.abort.is_set() {
                        return Err(RuntimeError::Cancelled { span: stmt.span });
                    }
                    if !self.eval_bool(cond, scope)? {
                        break;
                    }
                    match self.exec_stmts(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForRange { var, reverse, lo, hi, body } => {
                let lo = self.eval_int(lo, scope)?;
                let hi = self.eval_int(hi, scope)?;
                let loop_scope = self.arena.push(Some(scope));
                let range: Vec<i64> = if *reverse {
                    (lo..=hi).rev().collect()
                } else {
                    (lo..=hi).collect()
                };
                for i in range {
                    self.arena
                        .declare(loop_scope, var.clone(), Value::Int(i), SymbolKind::Variable);
                    match self.exec_stmts(body, loop_scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Exit { when } => {
                let fire = match when {
                    Some(cond) => self.eval_bool(cond, scope)?,
                    None => true,
                };
                Ok(if fire { Flow::Break } else { Flow::Normal })
            }
            StmtKind::Raise { name } => match name {
                Some(name) => Ok(Flow::Raise {
                    name: name.clone(),
                    message: format!("{name} raised"),
                }),
                // Bare RAISE: empty name marks a re-raise; the catching
                // block substitutes the current exception.
                None => Ok(Flow::Raise {
                    name: String::new(),
                    message: self
                        .current_error
                        .as_ref()
                        .map(|(_, m)| m.clone())
                        .unwrap_or_default(),
                }),
            },
            StmtKind::SelectInto { columns, into, table, where_clause } => {
                self.exec_select_into(columns, into, table, where_clause.as_ref(), scope, stmt.span)?;
                Ok(Flow::Normal)
            }
            StmtKind::Nested(block) => self.exec_block(block, Some(scope)),
            StmtKind::Sql(sql) => {
                self.exec_sql_in_scope(sql, Some(scope), stmt.span)?;
                Ok(Flow::Normal)
            }
            StmtKind::NullStmt => Ok(Flow::Normal),
        }
    }

    // -- SQL execution ---------------------------------------------------

    fn exec_sql(&mut self, sql: &SqlStmt, span: Span) -> Result<(), RuntimeError> {
        self.exec_sql_in_scope(sql, None, span)
    }

    fn exec_sql_in_scope(
        &mut self,
        sql: &SqlStmt,
        scope: Option<ScopeId>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match sql {
            SqlStmt::CreateTable { table, columns } => {
                let columns = columns
                    .iter()
                    .map(|c| Column {
                        name: c.name.clone(),
                        declared_type: c.type_text.clone(),
                        constraints: c.constraints.clone(),
                    })
                    .collect();
                if !self.catalog.create_table(table, columns) {
                    self.diags.push(Diagnostic::warning(
                        polyglot_lang_core::Stage::Run,
                        polyglot_lang_core::DiagKind::TypeError,
                        format!("table '{table}' already exists; CREATE ignored"),
                        span,
                    ));
                }
                Ok(())
            }
            SqlStmt::Insert { table, columns, rows } => {
                for row in rows {
                    let mut values = Vec::with_capacity(row.len());
                    for expr in row {
                        let value = self.eval_in_optional_scope(expr, scope)?;
                        values.push(to_sql_value(&value));
                    }
                    self.catalog
                        .insert_row(table, columns.as_deref(), values)
                        .map_err(|e| RuntimeError::TypeError {
                            message: e.to_string(),
                            span,
                        })?;
                }
                Ok(())
            }
            SqlStmt::Select { columns, table, where_clause } => {
                let (headers, rows) =
                    self.project(columns, table, where_clause.as_ref(), scope, span)?;
                for line in render_table(&headers, &rows) {
                    self.out.line(line);
                }
                Ok(())
            }
            SqlStmt::Update { table, assignments, where_clause } => {
                let table_name = table.clone();
                let matching = self.matching_rows(&table_name, where_clause.as_ref(), scope, span)?;
                let mut new_values = Vec::new();
                for index in &matching {
                    let mut row_updates = Vec::new();
                    for (column, expr) in assignments {
                        let value =
                            self.eval_in_row(expr, &table_name, *index, scope, span)?;
                        row_updates.push((column.clone(), to_sql_value(&value)));
                    }
                    new_values.push((*index, row_updates));
                }
                let table = self
                    .catalog
                    .table_mut(&table_name)
                    .expect("matching_rows verified the table");
                for (index, updates) in new_values {
                    for (column, value) in updates {
                        // Row keys must stay within the declared schema.
                        let Some(spelling) = table.column(&column).map(|c| c.name.clone()) else {
                            return Err(RuntimeError::TypeError {
                                message: format!(
                                    "column '{column}' does not exist in table '{}'",
                                    table.name
                                ),
                                span,
                            });
                        };
                        table.rows[index].insert(spelling, value);
                    }
                }
                Ok(())
            }
            SqlStmt::Delete { table, where_clause } => {
                let matching = self.matching_rows(table, where_clause.as_ref(), scope, span)?;
                let table = self
                    .catalog
                    .table_mut(table)
                    .expect("matching_rows verified the table");
                for index in matching.into_iter().rev() {
                    table.rows.remove(index);
                }
                Ok(())
            }
        }
    }

    /// Project a SELECT into headers plus rendered rows.
    fn project(
        &mut self,
        projection: &Projection,
        table_name: &str,
        where_clause: Option<&Expr>,
        scope: Option<ScopeId>,
        span: Span,
    ) -> Result<(Vec<String>, Vec<Vec<SqlValue>>), RuntimeError> {
        let matching = self.matching_rows(table_name, where_clause, scope, span)?;
        let table = self.catalog.table(table_name).expect("verified above");

        let headers: Vec<String> = match projection {
            Projection::Star => table.column_names(),
            Projection::Columns(columns) => {
                let mut resolved = Vec::with_capacity(columns.len());
                for column in columns {
                    match table.column(column) {
                        Some(c) => resolved.push(c.name.clone()),
                        None => {
                            return Err(RuntimeError::TypeError {
                                message: format!(
                                    "column '{column}' does not exist in table '{table_name}'"
                                ),
                                span,
                            })
                        }
                    }
                }
                resolved
            }
        };

        let mut rows = Vec::with_capacity(matching.len());
        for index in matching {
            let row = &table.rows[index];
            let cells = headers
                .iter()
                .map(|h| row.get(h).cloned().unwrap_or(SqlValue::Null))
                .collect();
            rows.push(cells);
        }
        Ok((headers, rows))
    }

    fn exec_select_into(
        &mut self,
        projection: &Projection,
        into: &[String],
        table: &str,
        where_clause: Option<&Expr>,
        scope: ScopeId,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let (_, rows) = self.project(projection, table, where_clause, Some(scope), span)?;
        let Some(first) = rows.first() else {
            return Err(RuntimeError::TypeError {
                message: "SELECT INTO returned no rows".to_string(),
                span,
            });
        };
        if first.len() != into.len() {
            return Err(RuntimeError::TypeError {
                message: format!(
                    "SELECT INTO lists {} column(s) for {} variable(s)",
                    first.len(),
                    into.len()
                ),
                span,
            });
        }
        for (var, cell) in into.iter().zip(first) {
            let value = from_sql_value(cell);
            if !self.arena.assign(scope, var, value) {
                return Err(RuntimeError::NameNotDefined {
                    name: var.clone(),
                    span,
                });
            }
        }
        Ok(())
    }

    /// Indexes of rows matching the WHERE clause, in table order.
    fn matching_rows(
        &mut self,
        table_name: &str,
        where_clause: Option<&Expr>,
        scope: Option<ScopeId>,
        span: Span,
    ) -> Result<Vec<usize>, RuntimeError> {
        let row_count = match self.catalog.table(table_name) {
            Some(table) => table.rows.len(),
            None => {
                return Err(RuntimeError::TypeError {
                    message: format!("table '{table_name}' does not exist"),
                    span,
                })
            }
        };
        let mut matching = Vec::new();
        for index in 0..row_count {
            let keep = match where_clause {
                Some(cond) => {
                    let value = self.eval_in_row(cond, table_name, index, scope, span)?;
                    matches!(value, Value::Bool(true))
                }
                None => true,
            };
            if keep {
                matching.push(index);
            }
        }
        Ok(matching)
    }

    /// Evaluate with bare identifiers resolving to the row's columns
    /// first, then to block variables.
    fn eval_in_row(
        &mut self,
        expr: &Expr,
        table_name: &str,
        row_index: usize,
        scope: Option<ScopeId>,
        span: Span,
    ) -> EvalResult {
        if let ExprKind::Ident(name) = &expr.kind {
            let table = self.catalog.table(table_name).expect("caller verified");
            if let Some(column) = table.column(name) {
                let cell = table.rows[row_index]
                    .get(&column.name)
                    .cloned()
                    .unwrap_or(SqlValue::Null);
                return Ok(from_sql_value(&cell));
            }
        }
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval_in_row(left, table_name, row_index, scope, span)?;
                let rhs = self.eval_in_row(right, table_name, row_index, scope, span)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_in_row(operand, table_name, row_index, scope, span)?;
                self.unary(*op, value, expr.span)
            }
            _ => self.eval_in_optional_scope(expr, scope),
        }
    }

    fn eval_in_optional_scope(&mut self, expr: &Expr, scope: Option<ScopeId>) -> EvalResult {
        match scope {
            Some(scope) => self.eval(expr, scope),
            None => {
                // Top-level SQL: only literals and builtin values.
                let scope = self.arena.push(None);
                self.eval(expr, scope)
            }
        }
    }

    // -- expressions -----------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::DateLit(d) => Ok(Value::Str(d.clone())),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => match name.as_str() {
                "SYSDATE" => Ok(Value::Str(SYSDATE_TEXT.to_string())),
                "SQLERRM" => Ok(Value::Str(
                    self.current_error
                        .as_ref()
                        .map(|(_, m)| m.clone())
                        .unwrap_or_else(|| "ORA-0000: normal, successful completion".to_string()),
                )),
                "SQLCODE" => Ok(Value::Int(
                    self.current_error.as_ref().map(|(c, _)| *c).unwrap_or(0),
                )),
                "USER" => Ok(Value::Str("POLYGLOT".to_string())),
                "UID" => Ok(Value::Int(0)),
                _ => match self.arena.lookup(scope, name) {
                    Some(binding) => Ok(binding.value.clone()),
                    None => Err(RuntimeError::NameNotDefined {
                        name: name.clone(),
                        span: expr.span,
                    }),
                },
            },
            ExprKind::FuncCall { name, args } => {
                let joined = name.join(".");
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call_builtin(&joined, values, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                self.unary(*op, value, expr.span)
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left, scope)?;
                let rhs = self.eval(right, scope)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<PlValue>, span: Span) -> EvalResult {
        match name {
            "TO_CHAR" => match args.first() {
                Some(value) => Ok(Value::Str(pl_str(value))),
                None => Ok(Value::Str(String::new())),
            },
            "CHR" => {
                let code = args.first().and_then(PlValue::as_int).unwrap_or(0);
                let c = char::from_u32(code.clamp(0, 0x10_FFFF) as u32).unwrap_or('\u{FFFD}');
                Ok(Value::Str(c.to_string()))
            }
            "NVL" => {
                let mut args = args.into_iter();
                let first = args.next().unwrap_or(Value::Null);
                let fallback = args.next().unwrap_or(Value::Null);
                Ok(match first {
                    Value::Null => fallback,
                    value => value,
                })
            }
            "SQLERRM" => Ok(Value::Str(
                self.current_error
                    .as_ref()
                    .map(|(_, m)| m.clone())
                    .unwrap_or_else(|| "ORA-0000: normal, successful completion".to_string()),
            )),
            other => Err(RuntimeError::NameNotDefined {
                name: other.to_string(),
                span,
            }),
        }
    }

    fn eval_bool(&mut self, expr: &Expr, scope: ScopeId) -> Result<bool, RuntimeError> {
        let value = self.eval(expr, scope)?;
        Ok(matches!(value, Value::Bool(true)))
    }

    fn eval_int(&mut self, expr: &Expr, scope: ScopeId) -> Result<i64, RuntimeError> {
        let value = self.eval(expr, scope)?;
        value.as_int().ok_or_else(|| RuntimeError::TypeError {
            message: format!("expected an integer, got {}", value.type_name()),
            span: expr.span,
        })
    }

    fn unary(&mut self, op: UnaryOp, value: PlValue, span: Span) -> EvalResult {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!matches!(value, Value::Bool(true)))),
            UnaryOp::Neg => match value {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => Err(RuntimeError::TypeError {
                    message: format!("cannot negate {}", other.type_name()),
                    span,
                }),
            },
            UnaryOp::Pos => Ok(value),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: PlValue, rhs: PlValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            Concat => Ok(Value::Str(format!("{}{}", pl_str(&lhs), pl_str(&rhs)))),
            Add | Sub | Mul => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => {
                    let result = match op {
                        Add => a.wrapping_add(*b),
                        Sub => a.wrapping_sub(*b),
                        Mul => a.wrapping_mul(*b),
                        _ => unreachable!(),
                    };
                    Ok(Value::Int(result))
                }
                _ => {
                    let (a, b) = self.numeric_pair(&lhs, &rhs, op, span)?;
                    let result = match op {
                        Add => a + b,
                        Sub => a - b,
                        Mul => a * b,
                        _ => unreachable!(),
                    };
                    Ok(Value::Float(result))
                }
            },
            Div => {
                let (a, b) = self.numeric_pair(&lhs, &rhs, op, span)?;
                if b == 0.0 {
                    // Catchable as ZERO_DIVIDE by exception sections.
                    Err(RuntimeError::DivisionByZero { span })
                } else if a.fract() == 0.0 && b.fract() == 0.0 && (a / b).fract() == 0.0 {
                    Ok(Value::Int((a / b) as i64))
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            Eq => Ok(Value::Bool(sql_eq(&lhs, &rhs))),
            Ne => Ok(Value::Bool(!sql_eq(&lhs, &rhs))),
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
            And => Ok(Value::Bool(
                matches!(lhs, Value::Bool(true)) && matches!(rhs, Value::Bool(true)),
            )),
            Or => Ok(Value::Bool(
                matches!(lhs, Value::Bool(true)) || matches!(rhs, Value::Bool(true)),
            )),
        }
    }

    fn numeric_pair(
        &self,
        lhs: &PlValue,
        rhs: &PlValue,
        op: BinOp,
        span: Span,
    ) -> Result<(f64, f64), RuntimeError> {
        match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok((a, b)),
            // VALUE_ERROR is in the catchable whitelist.
            _ => Err(RuntimeError::TypeError {
                message: format!(
                    "operator '{}' is not applicable to {} and {}",
                    op.symbol(),
                    lhs.type_name(),
                    rhs.type_name()
                ),
                span,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Exception mapping and value helpers
// ---------------------------------------------------------------------------

/// Which predefined exception name a runtime error simulates.
fn simulated_exception(err: &RuntimeError) -> Option<&'static str> {
    match err {
        RuntimeError::DivisionByZero { .. } => Some("ZERO_DIVIDE"),
        RuntimeError::TypeError { .. } => Some("VALUE_ERROR"),
        _ => None,
    }
}

fn predefined_code(name: &str) -> i64 {
    match name {
        "ZERO_DIVIDE" => -1476,
        "VALUE_ERROR" => -6502,
        _ => -1,
    }
}

fn user_error_code(name: &str) -> i64 {
    name.strip_prefix("ORA")
        .and_then(|rest| rest.parse::<i64>().ok())
        .unwrap_or(1)
}

fn sql_eq(lhs: &PlValue, rhs: &PlValue) -> bool {
    match (lhs, rhs) {
        // NULL never equals anything, itself included.
        (Value::Null, _) | (_, Value::Null) => false,
        _ => lhs.loose_eq(rhs),
    }
}

fn to_sql_value(value: &PlValue) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Int(n) => SqlValue::Int(*n),
        Value::Float(x) => SqlValue::Float(*x),
        Value::Str(s) => SqlValue::Str(s.clone()),
        other => SqlValue::Str(other.to_string()),
    }
}

fn from_sql_value(value: &SqlValue) -> PlValue {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(n) => Value::Int(*n),
        SqlValue::Float(x) => Value::Float(*x),
        SqlValue::Str(s) => Value::Str(s.clone()),
    }
}

/// Text rendering used by `DBMS_OUTPUT.PUT_LINE` and `||`.
fn pl_str(value: &PlValue) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => s.clone(),
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
        let (script, parse_diags) = parse(&tokens, &AbortFlag::new());
        assert!(parse_diags.is_empty(), "parse: {parse_diags:?}");
        interpret(&script, &AbortFlag::new())
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
    fn test_put_line_scenario() {
        assert_eq!(
            stdout("BEGIN DBMS_OUTPUT.PUT_LINE('n=' || (2+3*4)); END;\n/"),
            vec!["n=14"]
        );
    }

    #[test]
    fn test_declare_and_arithmetic() {
        let src = "DECLARE n NUMBER := 6; BEGIN n := n * 7; DBMS_OUTPUT.PUT_LINE(n); END;";
        assert_eq!(stdout(src), vec!["42"]);
    }

    #[test]
    fn test_for_loop_and_exit_when() {
        let src = "BEGIN FOR i IN 1..5 LOOP EXIT WHEN i > 3; DBMS_OUTPUT.PUT_LINE(i); END LOOP; END;";
        assert_eq!(stdout(src), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_reverse_range() {
        let src = "BEGIN FOR i IN REVERSE 1..3 LOOP DBMS_OUTPUT.PUT_LINE(i); END LOOP; END;";
        assert_eq!(stdout(src), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_user_exception_handled() {
        let src = "DECLARE e EXCEPTION; BEGIN RAISE e; EXCEPTION WHEN e THEN DBMS_OUTPUT.PUT_LINE('caught'); END;";
        assert_eq!(stdout(src), vec!["caught"]);
    }

    #[test]
    fn test_when_others_catches_zero_divide() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE(1/0); EXCEPTION WHEN OTHERS THEN DBMS_OUTPUT.PUT_LINE('caught ' || SQLCODE); END;";
        assert_eq!(stdout(src), vec!["caught -1476"]);
    }

    #[test]
    fn test_named_zero_divide_handler() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE(1/0); EXCEPTION WHEN ZERO_DIVIDE THEN DBMS_OUTPUT.PUT_LINE('div'); END;";
        assert_eq!(stdout(src), vec!["div"]);
    }

    #[test]
    fn test_unhandled_exception_aborts() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE('one'); RAISE ZERO_DIVIDE; END;\n/\nBEGIN DBMS_OUTPUT.PUT_LINE('two'); END;";
        let result = run_src(src);
        assert_eq!(result.stdout, vec!["one"]);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::UserException));
    }

    #[test]
    fn test_raise_application_error() {
        let src = "BEGIN RAISE_APPLICATION_ERROR(-20001, 'boom'); EXCEPTION WHEN OTHERS THEN DBMS_OUTPUT.PUT_LINE(SQLERRM); END;";
        assert_eq!(stdout(src), vec!["boom"]);
    }

    #[test]
    fn test_sql_round_trip() {
        let src = "CREATE TABLE t (id NUMBER, nm VARCHAR2(10));\nINSERT INTO t VALUES (1, 'a'), (2, 'b');\nSELECT * FROM t WHERE id > 1;";
        let lines = stdout(src);
        // Unquoted identifiers fold to uppercase in this dialect.
        assert_eq!(
            lines,
            vec![
                "ID | NM".to_string(),
                "-- | --".to_string(),
                "2  | b".to_string(),
                "(1 row affected)".to_string(),
            ]
        );
    }

    #[test]
    fn test_select_into() {
        let src = "CREATE TABLE t (id NUMBER, nm VARCHAR2(10));\nINSERT INTO t VALUES (7, 'x');\nDECLARE v VARCHAR2(10); BEGIN SELECT nm INTO v FROM t WHERE id = 7; DBMS_OUTPUT.PUT_LINE(v); END;";
        assert_eq!(stdout(src), vec!["x"]);
    }

    #[test]
    fn test_select_into_no_rows_is_error() {
        let src = "CREATE TABLE t (id NUMBER);\nDECLARE v NUMBER; BEGIN SELECT id INTO v FROM t; END;";
        let result = run_src(src);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::TypeError || d.kind == DiagKind::UserException));
    }

    #[test]
    fn test_update_and_delete() {
        let src = "CREATE TABLE t (id NUMBER);\nINSERT INTO t VALUES (1), (2), (3);\nUPDATE t SET id = 9 WHERE id = 2;\nDELETE FROM t WHERE id = 1;\nSELECT * FROM t;";
        let lines = stdout(src);
        assert!(lines.contains(&"9".to_string()) || lines.iter().any(|l| l.starts_with('9')));
        assert_eq!(lines.last().unwrap(), "(2 rows affected)");
    }

    #[test]
    fn test_nvl_and_to_char() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE(NVL(NULL, 'fallback') || TO_CHAR(5)); END;";
        assert_eq!(stdout(src), vec!["fallback5"]);
    }

    #[test]
    fn test_duplicate_create_is_warning() {
        let src = "CREATE TABLE t (id NUMBER);\nCREATE TABLE t (id NUMBER);";
        let result = run_src(src);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.severity == polyglot_lang_core::Severity::Warning));
    }

    #[test]
    fn test_sysdate_deterministic() {
        let src = "BEGIN DBMS_OUTPUT.PUT_LINE(SYSDATE); END;";
        assert_eq!(stdout(src), vec![SYSDATE_TEXT]);
    }
}
