//! T-SQL parser — recursive descent over `GO`-separated batches.
//! Statement terminators (`;`) are optional, as the dialect allows;
//! statement starts are keyword-driven.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    Batch, BinOp, ColumnDef, Expr, ExprKind, Projection, Script, SelectItem, Stmt, StmtKind,
    UnaryOp,
};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.message)]
pub struct ParseError(pub Diagnostic);

/// Parse a token stream into a script plus parse diagnostics.
pub fn parse(tokens: &[Token], abort: &AbortFlag) -> (Script, Vec<Diagnostic>) {
    Parser::new(tokens).run(abort)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diags: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            diags: Vec::new(),
        }
    }

    fn run(mut self, abort: &AbortFlag) -> (Script, Vec<Diagnostic>) {
        let start = self.current_span();
        let mut batches = Vec::new();
        let mut stmts: Vec<Stmt> = Vec::new();
        let mut batch_start = start;

        loop {
            if abort.is_set() {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Cancelled,
                    "parse cancelled",
                    self.current_span(),
                ));
                break;
            }
            match &self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Go => {
                    let end = self.advance().span;
                    if !stmts.is_empty() {
                        batches.push(Batch {
                            span: batch_start.cover(end),
                            stmts: std::mem::take(&mut stmts),
                        });
                    }
                    batch_start = self.current_span();
                }
                TokenKind::Semicolon => {
                    self.advance();
                }
                _ => match self.parse_stmt() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(ParseError(diag)) => {
                        self.diags.push(diag);
                        self.synchronize();
                    }
                },
            }
        }
        if !stmts.is_empty() {
            let end = self.prev_span();
            batches.push(Batch {
                span: batch_start.cover(end),
                stmts,
            });
        }
        let span = match (batches.first(), batches.last()) {
            (Some(first), Some(last)) => first.span.cover(last.span),
            _ => start,
        };
        (Script { batches, span }, self.diags)
    }

    // -- cursor ----------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind, expected: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        let (kind, message) = if tok.kind == TokenKind::Eof {
            (
                DiagKind::UnexpectedEof,
                format!("unexpected end of input (expected {expected})"),
            )
        } else {
            (
                DiagKind::Unexpected,
                format!("expected {expected}, found '{}'", tok.lexeme),
            )
        };
        ParseError(Diagnostic::error(Stage::Parse, kind, message, tok.span))
    }

    /// Seek to the next `;`, `GO`, or statement-starting keyword.
    fn synchronize(&mut self) {
        while !self.at(&TokenKind::Eof) {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Go
                | TokenKind::Create
                | TokenKind::Insert
                | TokenKind::Select
                | TokenKind::Update
                | TokenKind::Delete
                | TokenKind::Print
                | TokenKind::Declare => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn ident(&mut self, expected: &str) -> PResult<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn variable(&mut self, expected: &str) -> PResult<String> {
        match &self.current().kind {
            TokenKind::Var(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    // -- statements ------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let stmt = match &self.current().kind {
            TokenKind::Create => self.parse_create(start)?,
            TokenKind::Insert => self.parse_insert(start)?,
            TokenKind::Select => self.parse_select(start)?,
            TokenKind::Update => self.parse_update(start)?,
            TokenKind::Delete => self.parse_delete(start)?,
            TokenKind::Print => {
                self.advance();
                let value = self.parse_expr()?;
                let span = start.cover(value.span);
                Stmt { kind: StmtKind::Print(value), span }
            }
            TokenKind::Declare => {
                self.advance();
                let name = self.variable("a variable (@name)")?;
                let type_text = self.parse_type_text()?;
                let init = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let span = start.cover(self.prev_span());
                Stmt {
                    kind: StmtKind::Declare { name, type_text, init },
                    span,
                }
            }
            TokenKind::Set => {
                self.advance();
                let name = self.variable("a variable (@name)")?;
                self.consume(&TokenKind::Eq, "'='")?;
                let value = self.parse_expr()?;
                let span = start.cover(value.span);
                Stmt { kind: StmtKind::SetVar { name, value }, span }
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                let then_branch = self.parse_branch()?;
                let else_branch = if self.eat(&TokenKind::Else) {
                    self.parse_branch()?
                } else {
                    Vec::new()
                };
                let span = start.cover(self.prev_span());
                Stmt {
                    kind: StmtKind::If { cond, then_branch, else_branch },
                    span,
                }
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_branch()?;
                let span = start.cover(self.prev_span());
                Stmt { kind: StmtKind::While { cond, body }, span }
            }
            TokenKind::Break => {
                self.advance();
                Stmt { kind: StmtKind::Break, span: start }
            }
            TokenKind::Continue => {
                self.advance();
                Stmt { kind: StmtKind::Continue, span: start }
            }
            _ => return Err(self.unexpected("a statement")),
        };
        let _ = self.eat(&TokenKind::Semicolon);
        Ok(stmt)
    }

    /// `BEGIN stmts END` or one statement.
    fn parse_branch(&mut self) -> PResult<Vec<Stmt>> {
        if self.eat(&TokenKind::Begin) {
            let mut body = Vec::new();
            while !self.at(&TokenKind::End) && !self.at(&TokenKind::Eof) {
                if self.eat(&TokenKind::Semicolon) {
                    continue;
                }
                body.push(self.parse_stmt()?);
            }
            if !self.eat(&TokenKind::End) {
                return Err(ParseError(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::BlockClosureMissing,
                    "'END' expected before end of input",
                    self.current_span(),
                )));
            }
            Ok(body)
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_create(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // CREATE
        self.consume(&TokenKind::Table, "'TABLE'")?;
        let table = self.ident("a table name")?;
        self.consume(&TokenKind::LParen, "'('")?;
        let mut columns = Vec::new();
        loop {
            let name = self.ident("a column name")?;
            let type_text = self.parse_type_text()?;
            let mut constraints = Vec::new();
            while let TokenKind::Ident(word) = &self.current().kind {
                constraints.push(word.clone());
                self.advance();
            }
            if self.eat(&TokenKind::Not) {
                self.consume(&TokenKind::Null, "'NULL'")?;
                constraints.push("NOT NULL".to_string());
            }
            columns.push(ColumnDef { name, type_text, constraints });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.consume(&TokenKind::RParen, "')'")?.span;
        Ok(Stmt {
            kind: StmtKind::CreateTable { table, columns },
            span: start.cover(end),
        })
    }

    fn parse_type_text(&mut self) -> PResult<String> {
        let mut text = self.ident("a type name")?;
        if self.eat(&TokenKind::LParen) {
            text.push('(');
            loop {
                match &self.current().kind {
                    TokenKind::Int(n) => {
                        text.push_str(&n.to_string());
                        self.advance();
                    }
                    _ => return Err(self.unexpected("a length")),
                }
                if self.eat(&TokenKind::Comma) {
                    text.push(',');
                } else {
                    break;
                }
            }
            self.consume(&TokenKind::RParen, "')'")?;
            text.push(')');
        }
        Ok(text)
    }

    fn parse_insert(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // INSERT
        self.consume(&TokenKind::Into, "'INTO'")?;
        let table = self.ident("a table name")?;
        let columns = if self.at(&TokenKind::LParen) {
            self.advance();
            let mut cols = vec![self.ident("a column name")?];
            while self.eat(&TokenKind::Comma) {
                cols.push(self.ident("a column name")?);
            }
            self.consume(&TokenKind::RParen, "')'")?;
            Some(cols)
        } else {
            None
        };
        self.consume(&TokenKind::Values, "'VALUES'")?;
        let mut rows = vec![self.parse_value_row()?];
        while self.eat(&TokenKind::Comma) {
            rows.push(self.parse_value_row()?);
        }
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::Insert { table, columns, rows },
            span,
        })
    }

    fn parse_value_row(&mut self) -> PResult<Vec<Expr>> {
        self.consume(&TokenKind::LParen, "'('")?;
        let mut row = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            row.push(self.parse_expr()?);
        }
        self.consume(&TokenKind::RParen, "')'")?;
        Ok(row)
    }

    fn parse_select(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // SELECT
        let columns = if self.eat(&TokenKind::Star) {
            Projection::Star
        } else {
            let mut items = vec![self.parse_select_item()?];
            while self.eat(&TokenKind::Comma) {
                items.push(self.parse_select_item()?);
            }
            Projection::Items(items)
        };
        self.consume(&TokenKind::From, "'FROM'")?;
        let table = self.ident("a table name")?;
        let where_clause = if self.eat(&TokenKind::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::Select { columns, table, where_clause },
            span,
        })
    }

    fn parse_select_item(&mut self) -> PResult<SelectItem> {
        if let TokenKind::Ident(name) = &self.current().kind {
            if name.eq_ignore_ascii_case("COUNT") {
                self.advance();
                self.consume(&TokenKind::LParen, "'('")?;
                self.consume(&TokenKind::Star, "'*'")?;
                self.consume(&TokenKind::RParen, "')'")?;
                return Ok(SelectItem::CountStar);
            }
        }
        Ok(SelectItem::Column(self.ident("a column name")?))
    }

    fn parse_update(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // UPDATE
        let table = self.ident("a table name")?;
        self.consume(&TokenKind::Set, "'SET'")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.ident("a column name")?;
            self.consume(&TokenKind::Eq, "'='")?;
            let value = self.parse_expr()?;
            assignments.push((column, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let where_clause = if self.eat(&TokenKind::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::Update { table, assignments, where_clause },
            span,
        })
    }

    fn parse_delete(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // DELETE
        self.consume(&TokenKind::From, "'FROM'")?;
        let table = self.ident("a table name")?;
        let where_clause = if self.eat(&TokenKind::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::Delete { table, where_clause },
            span,
        })
    }

    // -- expressions -----------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.at(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while self.at(&TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.at(&TokenKind::Not) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_not()?;
            let span = start.cover(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) },
                span,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        if let Some(op) = match self.current().kind {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        } {
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.cover(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary { op, operand: Box::new(operand) },
                span,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.current().clone();
        let span = tok.span;
        match tok.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Int(n), span })
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Float(x), span })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Str(s), span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr { kind: ExprKind::Null, span })
            }
            TokenKind::Var(name) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Var(name), span })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.consume(&TokenKind::RParen, "')'")?;
                    return Ok(Expr {
                        kind: ExprKind::FuncCall { name, args },
                        span: span.cover(close.span),
                    });
                }
                Ok(Expr { kind: ExprKind::Ident(name), span })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.cover(right.span);
    Expr {
        kind: ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
        span,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_ok(src: &str) -> Script {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (script, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.is_empty(), "parse: {diags:?}");
        script
    }

    #[test]
    fn test_scenario_statements() {
        let src = "CREATE TABLE p (id INT, nm VARCHAR(10));\nINSERT INTO p VALUES (1,'a'),(2,'b');\nSELECT * FROM p WHERE id > 1;\n";
        let script = parse_ok(src);
        assert_eq!(script.batches.len(), 1);
        let stmts = &script.batches[0].stmts;
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::CreateTable { .. }));
        match &stmts[1].kind {
            StmtKind::Insert { rows, .. } => assert_eq!(rows.len(), 2),
            other => panic!("expected insert, got {other:?}"),
        }
        assert!(matches!(stmts[2].kind, StmtKind::Select { .. }));
    }

    #[test]
    fn test_go_separates_batches() {
        let src = "PRINT 'a'\nGO\nPRINT 'b'\nGO";
        let script = parse_ok(src);
        assert_eq!(script.batches.len(), 2);
    }

    #[test]
    fn test_declare_and_set() {
        let src = "DECLARE @n INT = 1\nSET @n = @n + 1\nPRINT @n";
        let script = parse_ok(src);
        let stmts = &script.batches[0].stmts;
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Declare { name, .. } if name == "@N"
        ));
        assert!(matches!(&stmts[1].kind, StmtKind::SetVar { .. }));
    }

    #[test]
    fn test_count_star_projection() {
        let script = parse_ok("SELECT COUNT(*) FROM p;");
        match &script.batches[0].stmts[0].kind {
            StmtKind::Select { columns: Projection::Items(items), .. } => {
                assert!(matches!(items[0], SelectItem::CountStar));
            }
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn test_if_else_with_blocks() {
        let src = "IF @x > 1 BEGIN PRINT 'big' END ELSE PRINT 'small'";
        let script = parse_ok(src);
        match &script.batches[0].stmts[0].kind {
            StmtKind::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.len(), 1);
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_while_with_break() {
        let src = "WHILE @i < 3 BEGIN SET @i = @i + 1 IF @i = 2 BREAK END";
        let script = parse_ok(src);
        assert!(matches!(
            script.batches[0].stmts[0].kind,
            StmtKind::While { .. }
        ));
    }

    #[test]
    fn test_update_delete() {
        let src = "UPDATE p SET nm = 'z' WHERE id = 1;\nDELETE FROM p WHERE id = 2;";
        let script = parse_ok(src);
        assert!(matches!(
            script.batches[0].stmts[0].kind,
            StmtKind::Update { .. }
        ));
        assert!(matches!(
            script.batches[0].stmts[1].kind,
            StmtKind::Delete { .. }
        ));
    }

    #[test]
    fn test_recovery_to_next_statement() {
        let src = "SELECT FROM;\nPRINT 'still here'";
        let (tokens, _) = lex(src);
        let (script, diags) = parse(&tokens, &AbortFlag::new());
        assert!(!diags.is_empty());
        assert!(script
            .batches
            .iter()
            .flat_map(|b| &b.stmts)
            .any(|s| matches!(s.kind, StmtKind::Print(_))));
    }

    #[test]
    fn test_missing_end_in_block() {
        let (tokens, _) = lex("IF 1 = 1 BEGIN PRINT 'a'");
        let (_, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.iter().any(|d| d.kind == DiagKind::BlockClosureMissing));
    }
}
