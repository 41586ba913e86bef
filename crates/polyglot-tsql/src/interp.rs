//! T-SQL interpreter — walks the batch list.
//!
//! Variables and the catalog live for the whole script; `GO` only
//! marks batch boundaries. `SELECT` renders the fixed-width grid into
//! captured stdout; `PRINT` appends one line.

use polyglot_lang_core::{AbortFlag, Diagnostic, Span};
use polyglot_runtime::{Flow, Output, RuntimeError, ScopeArena, ScopeId, SymbolKind, Value};
use polyglot_sql::{render_table, Catalog, Column, SqlValue};

use crate::ast::{
    BinOp, Expr, ExprKind, Projection, Script, SelectItem, Stmt, StmtKind, UnaryOp,
};

/// T-SQL's subset has no user-defined callables; this fills the shared
/// value type's function slot.
#[derive(Debug)]
pub enum TsRoutine {}

type TsValue = Value<TsRoutine>;

/// Fixed GETDATE/CURRENT_TIMESTAMP placeholder for deterministic runs.
pub const GETDATE_TEXT: &str = "2024-01-01 00:00:00.000";
/// Fixed @@VERSION placeholder.
pub const VERSION_TEXT: &str = "SQL Server (in-memory simulation)";

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
    'batches: for batch in &script.batches {
        match interp.exec_stmts(&batch.stmts) {
            Ok(_) => {}
            Err(err) => {
                diagnostics.append(&mut interp.diags);
                diagnostics.push(err.to_diagnostic());
                break 'batches;
            }
        }
    }
    diagnostics.append(&mut interp.diags);
    RunResult {
        stdout: interp.out.finish(),
        diagnostics,
    }
}

struct Interp {
    arena: ScopeArena<TsRoutine>,
    globals: ScopeId,
    catalog: Catalog,
    out: Output,
    diags: Vec<Diagnostic>,
    abort: AbortFlag,
}

type ExecResult = Result<Flow<TsRoutine>, RuntimeError>;
type EvalResult = Result<TsValue, RuntimeError>;

impl Interp {
    fn new(abort: AbortFlag) -> Self {
        let mut arena = ScopeArena::new();
        let globals = arena.push(None);
        Self {
            arena,
            globals,
            catalog: Catalog::new(),
            out: Output::new(),
            diags: Vec::new(),
            abort,
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> ExecResult {
        for stmt in stmts {
            if self.abort.is_set() {
                return Err(RuntimeError::Cancelled { span: stmt.span });
            }
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        match &stmt.kind {
            StmtKind::CreateTable { table, columns } => {
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
                        stmt.span,
                    ));
                }
                Ok(Flow::Normal)
            }
            StmtKind::Insert { table, columns, rows } => {
                for row in rows {
                    let mut values = Vec::with_capacity(row.len());
                    for expr in row {
                        let value = self.eval(expr)?;
                        values.push(to_sql_value(&value));
                    }
                    self.catalog
                        .insert_row(table, columns.as_deref(), values)
                        .map_err(|e| RuntimeError::TypeError {
                            message: e.to_string(),
                            span: stmt.span,
                        })?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::Select { columns, table, where_clause } => {
                self.exec_select(columns, table, where_clause.as_ref(), stmt.span)?;
                Ok(Flow::Normal)
            }
            StmtKind::Update { table, assignments, where_clause } => {
                let matching = self.matching_rows(table, where_clause.as_ref(), stmt.span)?;
                let mut new_values = Vec::new();
                for index in &matching {
                    let mut row_updates = Vec::new();
                    for (column, expr) in assignments {
                        let value = self.eval_in_row(expr, table, *index, stmt.span)?;
                        row_updates.push((column.clone(), to_sql_value(&value)));
                    }
                    new_values.push((*index, row_updates));
                }
                let table = self
                    .catalog
                    .table_mut(table)
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
                                span: stmt.span,
                            });
                        };
                        table.rows[index].insert(spelling, value);
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Delete { table, where_clause } => {
                let matching = self.matching_rows(table, where_clause.as_ref(), stmt.span)?;
                let table = self
                    .catalog
                    .table_mut(table)
                    .expect("matching_rows verified the table");
                for index in matching.into_iter().rev() {
                    table.rows.remove(index);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Print(value) => {
                let value = self.eval(value)?;
                self.out.line(ts_str(&value));
                Ok(Flow::Normal)
            }
            StmtKind::Declare { name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init)?,
                    None => Value::Null,
                };
                self.arena
                    .declare(self.globals, name.clone(), value, SymbolKind::Variable);
                Ok(Flow::Normal)
            }
            StmtKind::SetVar { name, value } => {
                let value = self.eval(value)?;
                if !self.arena.assign(self.globals, name, value) {
                    return Err(RuntimeError::NameNotDefined {
                        name: name.clone(),
                        span: stmt.span,
                    });
                }
                Ok(Flow::Normal)
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let test = self.eval(cond)?;
                if matches!(test, Value::Bool(true)) {
                    self.exec_stmts(then_branch)
                } else {
                    self.exec_stmts(else_branch)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    if self.abort.is_set() {
                        return Err(RuntimeError::Cancelled { span: stmt.span });
                    }
                    let test = self.eval(cond)?;
                    if !matches!(test, Value::Bool(true)) {
                        break;
                    }
                    match self.exec_stmts(body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
        }
    }

    // -- SELECT ----------------------------------------------------------

    fn exec_select(
        &mut self,
        projection: &Projection,
        table_name: &str,
        where_clause: Option<&Expr>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let matching = self.matching_rows(table_name, where_clause, span)?;
        let table = self.catalog.table(table_name).expect("verified above");

        let (headers, rows) = match projection {
            Projection::Star => {
                let headers = table.column_names();
                let rows = matching
                    .iter()
                    .map(|&index| {
                        headers
                            .iter()
                            .map(|h| table.rows[index].get(h).cloned().unwrap_or(SqlValue::Null))
                            .collect()
                    })
                    .collect();
                (headers, rows)
            }
            Projection::Items(items) => {
                let mut headers = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        SelectItem::CountStar => headers.push("count".to_string()),
                        SelectItem::Column(column) => match table.column(column) {
                            Some(c) => headers.push(c.name.clone()),
                            None => {
                                return Err(RuntimeError::TypeError {
                                    message: format!(
                                        "column '{column}' does not exist in table '{table_name}'"
                                    ),
                                    span,
                                })
                            }
                        },
                    }
                }
                // A COUNT(*) projection aggregates to a single row.
                if items.iter().any(|i| matches!(i, SelectItem::CountStar)) {
                    let row = items
                        .iter()
                        .map(|item| match item {
                            SelectItem::CountStar => SqlValue::Int(matching.len() as i64),
                            SelectItem::Column(column) => {
                                let spelling = table.column(column).map(|c| c.name.clone());
                                matching
                                    .first()
                                    .zip(spelling)
                                    .and_then(|(&index, s)| table.rows[index].get(&s).cloned())
                                    .unwrap_or(SqlValue::Null)
                            }
                        })
                        .collect();
                    (headers, vec![row])
                } else {
                    let rows = matching
                        .iter()
                        .map(|&index| {
                            headers
                                .iter()
                                .map(|h| {
                                    table.rows[index].get(h).cloned().unwrap_or(SqlValue::Null)
                                })
                                .collect()
                        })
                        .collect();
                    (headers, rows)
                }
            }
        };

        for line in render_table(&headers, &rows) {
            self.out.line(line);
        }
        Ok(())
    }

    fn matching_rows(
        &mut self,
        table_name: &str,
        where_clause: Option<&Expr>,
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
                    let value = self.eval_in_row(cond, table_name, index, span)?;
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

    /// Evaluate with bare identifiers resolving to the row's columns.
    fn eval_in_row(
        &mut self,
        expr: &Expr,
        table_name: &str,
        row_index: usize,
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
                let lhs = self.eval_in_row(left, table_name, row_index, span)?;
                let rhs = self.eval_in_row(right, table_name, row_index, span)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_in_row(operand, table_name, row_index, span)?;
                self.unary(*op, value, expr.span)
            }
            _ => self.eval(expr),
        }
    }

    // -- expressions -----------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Var(name) => match name.as_str() {
                "@@VERSION" => Ok(Value::Str(VERSION_TEXT.to_string())),
                _ => match self.arena.lookup(self.globals, name) {
                    Some(binding) => Ok(binding.value.clone()),
                    None => Err(RuntimeError::NameNotDefined {
                        name: name.clone(),
                        span: expr.span,
                    }),
                },
            },
            ExprKind::Ident(name) => {
                if name.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
                    Ok(Value::Str(GETDATE_TEXT.to_string()))
                } else {
                    Err(RuntimeError::NameNotDefined {
                        name: name.clone(),
                        span: expr.span,
                    })
                }
            }
            ExprKind::FuncCall { name, args } => {
                for arg in args {
                    self.eval(arg)?;
                }
                if name.eq_ignore_ascii_case("GETDATE") {
                    Ok(Value::Str(GETDATE_TEXT.to_string()))
                } else {
                    Err(RuntimeError::NameNotDefined {
                        name: name.clone(),
                        span: expr.span,
                    })
                }
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.unary(*op, value, expr.span)
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, value: TsValue, span: Span) -> EvalResult {
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

    fn binary(&mut self, op: BinOp, lhs: TsValue, rhs: TsValue, span: Span) -> EvalResult {
        use BinOp::*;
        match op {
            // `+` concatenates when both operands are strings.
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
                    let (a, b) = self.numeric_pair(&lhs, &rhs, op, span)?;
                    if b == 0.0 {
                        Err(RuntimeError::DivisionByZero { span })
                    } else {
                        Ok(Value::Float(a / b))
                    }
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

    fn arith(&mut self, op: BinOp, lhs: TsValue, rhs: TsValue, span: Span) -> EvalResult {
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
                let (a, b) = self.numeric_pair(&lhs, &rhs, op, span)?;
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

    fn numeric_pair(
        &self,
        lhs: &TsValue,
        rhs: &TsValue,
        op: BinOp,
        span: Span,
    ) -> Result<(f64, f64), RuntimeError> {
        match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok((a, b)),
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
// Value helpers
// ---------------------------------------------------------------------------

fn sql_eq(lhs: &TsValue, rhs: &TsValue) -> bool {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => false,
        _ => lhs.loose_eq(rhs),
    }
}

fn to_sql_value(value: &TsValue) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Int(n) => SqlValue::Int(*n),
        Value::Float(x) => SqlValue::Float(*x),
        Value::Str(s) => SqlValue::Str(s.clone()),
        other => SqlValue::Str(other.to_string()),
    }
}

fn from_sql_value(value: &SqlValue) -> TsValue {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(n) => Value::Int(*n),
        SqlValue::Float(x) => Value::Float(*x),
        SqlValue::Str(s) => Value::Str(s.clone()),
    }
}

fn ts_str(value: &TsValue) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
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
    fn test_scenario_fixed_width_table() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nSELECT * FROM p WHERE id > 1;\n";
        assert_eq!(
            stdout(src),
            vec![
                "id | nm".to_string(),
                "-- | --".to_string(),
                "2  | b".to_string(),
                "(1 row affected)".to_string(),
            ]
        );
    }

    #[test]
    fn test_print_and_variables() {
        let src = "DECLARE @n INT = 4\nSET @n = @n * 10 + 2\nPRINT @n";
        assert_eq!(stdout(src), vec!["42"]);
    }

    #[test]
    fn test_string_concatenation_with_plus() {
        assert_eq!(stdout("PRINT 'a' + 'b'"), vec!["ab"]);
    }

    #[test]
    fn test_count_star() {
        let src = "CREATE TABLE p (id INT);\nINSERT INTO p VALUES (1),(2),(3);\nSELECT COUNT(*) FROM p WHERE id > 1;";
        let lines = stdout(src);
        assert_eq!(lines[0], "count");
        assert_eq!(lines[2], "2");
    }

    #[test]
    fn test_go_batches_share_state() {
        let src = "DECLARE @n INT = 7\nGO\nPRINT @n\nGO";
        assert_eq!(stdout(src), vec!["7"]);
    }

    #[test]
    fn test_while_loop_with_break() {
        let src = "DECLARE @i INT = 0\nWHILE @i < 9 BEGIN SET @i = @i + 1 IF @i = 3 BREAK END\nPRINT @i";
        assert_eq!(stdout(src), vec!["3"]);
    }

    #[test]
    fn test_if_else() {
        let src = "DECLARE @x INT = 5\nIF @x > 3 PRINT 'big' ELSE PRINT 'small'";
        assert_eq!(stdout(src), vec!["big"]);
    }

    #[test]
    fn test_update_and_delete() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nUPDATE p SET nm = 'z' WHERE id = 2;\nDELETE FROM p WHERE id = 1;\nSELECT nm FROM p;";
        let lines = stdout(src);
        assert!(lines.contains(&"z".to_string()));
        assert_eq!(lines.last().unwrap(), "(1 row affected)");
    }

    #[test]
    fn test_version_and_getdate() {
        let lines = stdout("PRINT @@VERSION\nPRINT GETDATE()");
        assert_eq!(lines[0], VERSION_TEXT);
        assert_eq!(lines[1], GETDATE_TEXT);
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let result = run_src("PRINT 1 / 0");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagKind::DivisionByZero));
    }

    #[test]
    fn test_stdout_truncates_at_error() {
        let result = run_src("PRINT 'one'\nPRINT 1/0\nPRINT 'two'");
        assert_eq!(result.stdout, vec!["one"]);
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1);";
        let result = run_src(src);
        assert!(result.diagnostics.iter().any(|d| d.is_error()));
    }
}
