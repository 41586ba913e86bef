//! PL/SQL parser — recursive descent over the case-folded token
//! stream. Top-level items are SQL statements and anonymous blocks;
//! `/` on its own is the SQL*Plus separator and is skipped between
//! items.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    BinOp, Block, ColumnDef, Expr, ExprKind, Handler, Item, ItemKind, Projection, Script, SqlStmt,
    Stmt, StmtKind, UnaryOp, VarDecl,
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
        let mut items = Vec::new();
        while !self.at(&TokenKind::Eof) {
            if abort.is_set() {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Cancelled,
                    "parse cancelled",
                    self.current_span(),
                ));
                break;
            }
            // `/` between items is the SQL*Plus batch separator.
            if self.eat(&TokenKind::Slash) {
                continue;
            }
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(ParseError(diag)) => {
                    self.diags.push(diag);
                    self.synchronize();
                }
            }
        }
        let span = match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.span.cover(last.span),
            _ => start,
        };
        (Script { items, span }, self.diags)
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

    /// Seek to the next `;` or `/` separator.
    fn synchronize(&mut self) {
        while !self.at(&TokenKind::Eof) {
            if self.at(&TokenKind::Semicolon) || self.at(&TokenKind::Slash) {
                self.advance();
                return;
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

    // -- items -----------------------------------------------------------

    fn parse_item(&mut self) -> PResult<Item> {
        let start = self.current_span();
        match self.current().kind {
            TokenKind::Declare | TokenKind::Begin => {
                let block = self.parse_block()?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Item {
                    kind: ItemKind::Block(block),
                    span: start.cover(end),
                })
            }
            _ => {
                let sql = self.parse_sql_stmt()?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Item {
                    kind: ItemKind::Sql(sql),
                    span: start.cover(end),
                })
            }
        }
    }

    /// `[DECLARE decls] BEGIN body [EXCEPTION handlers] END`
    fn parse_block(&mut self) -> PResult<Block> {
        let mut decls = Vec::new();
        if self.eat(&TokenKind::Declare) {
            while !self.at(&TokenKind::Begin) && !self.at(&TokenKind::Eof) {
                decls.push(self.parse_var_decl()?);
            }
        }
        self.consume(&TokenKind::Begin, "'BEGIN'")?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::Exception)
            && !self.at(&TokenKind::End)
            && !self.at(&TokenKind::Eof)
        {
            body.push(self.parse_stmt()?);
        }
        let mut handlers = Vec::new();
        if self.eat(&TokenKind::Exception) {
            while self.at(&TokenKind::When) {
                handlers.push(self.parse_handler()?);
            }
        }
        if !self.eat(&TokenKind::End) {
            return Err(ParseError(Diagnostic::error(
                Stage::Parse,
                DiagKind::BlockClosureMissing,
                "'END' expected before end of input",
                self.current_span(),
            )));
        }
        Ok(Block { decls, body, handlers })
    }

    /// `name type [:= init] ;` — `EXCEPTION` declares a user exception.
    fn parse_var_decl(&mut self) -> PResult<VarDecl> {
        let start = self.current_span();
        let name = self.ident("a declaration name")?;
        let type_name = if self.eat(&TokenKind::Exception) {
            "EXCEPTION".to_string()
        } else {
            self.parse_type_text()?
        };
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
        Ok(VarDecl {
            name,
            type_name,
            init,
            span: start.cover(end),
        })
    }

    /// Type text like `NUMBER`, `VARCHAR2(30)`, `NUMBER(8,2)`.
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

    fn parse_handler(&mut self) -> PResult<Handler> {
        let start = self.consume(&TokenKind::When, "'WHEN'")?.span;
        let names = if self.eat(&TokenKind::Others) {
            Vec::new()
        } else {
            let mut names = vec![self.ident("an exception name")?];
            while self.eat(&TokenKind::Or) {
                names.push(self.ident("an exception name")?);
            }
            names
        };
        self.consume(&TokenKind::Then, "'THEN'")?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::When) && !self.at(&TokenKind::End) && !self.at(&TokenKind::Eof)
        {
            body.push(self.parse_stmt()?);
        }
        let span = start.cover(self.prev_span());
        Ok(Handler { names, body, span })
    }

    // -- statements ------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::Begin | TokenKind::Declare => {
                let block = self.parse_block()?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Nested(block), span: start.cover(end) })
            }
            TokenKind::If => self.parse_if(start),
            TokenKind::Loop => {
                self.advance();
                let body = self.parse_stmts_until_end()?;
                self.consume(&TokenKind::Loop, "'LOOP' after 'END'")?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Loop { body }, span: start.cover(end) })
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::Loop, "'LOOP'")?;
                let body = self.parse_stmts_until_end()?;
                self.consume(&TokenKind::Loop, "'LOOP' after 'END'")?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::While { cond, body }, span: start.cover(end) })
            }
            TokenKind::For => {
                self.advance();
                let var = self.ident("loop variable")?;
                self.consume(&TokenKind::In, "'IN'")?;
                let reverse = self.eat(&TokenKind::Reverse);
                let lo = self.parse_expr()?;
                self.consume(&TokenKind::DotDot, "'..'")?;
                let hi = self.parse_expr()?;
                self.consume(&TokenKind::Loop, "'LOOP'")?;
                let body = self.parse_stmts_until_end()?;
                self.consume(&TokenKind::Loop, "'LOOP' after 'END'")?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt {
                    kind: StmtKind::ForRange { var, reverse, lo, hi, body },
                    span: start.cover(end),
                })
            }
            TokenKind::Exit => {
                self.advance();
                let when = if self.eat(&TokenKind::When) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Exit { when }, span: start.cover(end) })
            }
            TokenKind::Raise => {
                self.advance();
                let name = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.ident("an exception name")?)
                };
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Raise { name }, span: start.cover(end) })
            }
            TokenKind::Null => {
                self.advance();
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::NullStmt, span: start.cover(end) })
            }
            TokenKind::Select => {
                let stmt = self.parse_select_in_block(start)?;
                Ok(stmt)
            }
            TokenKind::Insert | TokenKind::Update | TokenKind::Delete | TokenKind::Create => {
                let sql = self.parse_sql_stmt()?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Sql(sql), span: start.cover(end) })
            }
            TokenKind::Ident(_) => {
                let mut name = vec![self.ident("an identifier")?];
                while self.eat(&TokenKind::Dot) {
                    name.push(self.ident("a name after '.'")?);
                }
                if self.eat(&TokenKind::Assign) {
                    if name.len() != 1 {
                        return Err(ParseError(Diagnostic::error(
                            Stage::Parse,
                            DiagKind::Unexpected,
                            "qualified names cannot be assigned",
                            start,
                        )));
                    }
                    let value = self.parse_expr()?;
                    let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                    return Ok(Stmt {
                        kind: StmtKind::Assign {
                            target: name.remove(0),
                            value,
                        },
                        span: start.cover(end),
                    });
                }
                let args = if self.at(&TokenKind::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt {
                    kind: StmtKind::Call { name, args },
                    span: start.cover(end),
                })
            }
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_if(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // IF
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        self.consume(&TokenKind::Then, "'THEN'")?;
        let mut body = Vec::new();
        loop {
            while !self.at(&TokenKind::Elsif)
                && !self.at(&TokenKind::Else)
                && !self.at(&TokenKind::End)
                && !self.at(&TokenKind::Eof)
            {
                body.push(self.parse_stmt()?);
            }
            branches.push((cond.clone(), std::mem::take(&mut body)));
            break;
        }
        let mut orelse = Vec::new();
        loop {
            if self.eat(&TokenKind::Elsif) {
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::Then, "'THEN'")?;
                let mut arm = Vec::new();
                while !self.at(&TokenKind::Elsif)
                    && !self.at(&TokenKind::Else)
                    && !self.at(&TokenKind::End)
                    && !self.at(&TokenKind::Eof)
                {
                    arm.push(self.parse_stmt()?);
                }
                branches.push((cond, arm));
            } else if self.eat(&TokenKind::Else) {
                while !self.at(&TokenKind::End) && !self.at(&TokenKind::Eof) {
                    orelse.push(self.parse_stmt()?);
                }
                break;
            } else {
                break;
            }
        }
        self.consume(&TokenKind::End, "'END'")?;
        self.consume(&TokenKind::If, "'IF' after 'END'")?;
        let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
        Ok(Stmt {
            kind: StmtKind::If { branches, orelse },
            span: start.cover(end),
        })
    }

    /// Loop bodies run until the `END` of `END LOOP` (not consumed).
    fn parse_stmts_until_end(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::End) && !self.at(&TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        self.consume(&TokenKind::End, "'END'")?;
        Ok(body)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.consume(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    // -- SQL statements --------------------------------------------------

    fn parse_sql_stmt(&mut self) -> PResult<SqlStmt> {
        match self.current().kind {
            TokenKind::Create => {
                self.advance();
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
                    // `NOT NULL` arrives as keyword tokens.
                    if self.eat(&TokenKind::Not) {
                        self.consume(&TokenKind::Null, "'NULL'")?;
                        constraints.push("NOT NULL".to_string());
                    }
                    columns.push(ColumnDef { name, type_text, constraints });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(&TokenKind::RParen, "')'")?;
                Ok(SqlStmt::CreateTable { table, columns })
            }
            TokenKind::Insert => {
                self.advance();
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
                Ok(SqlStmt::Insert { table, columns, rows })
            }
            TokenKind::Select => {
                self.advance();
                let columns = self.parse_projection()?;
                self.consume(&TokenKind::From, "'FROM'")?;
                let table = self.ident("a table name")?;
                let where_clause = self.parse_where()?;
                Ok(SqlStmt::Select { columns, table, where_clause })
            }
            TokenKind::Update => {
                self.advance();
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
                let where_clause = self.parse_where()?;
                Ok(SqlStmt::Update { table, assignments, where_clause })
            }
            TokenKind::Delete => {
                self.advance();
                self.consume(&TokenKind::From, "'FROM'")?;
                let table = self.ident("a table name")?;
                let where_clause = self.parse_where()?;
                Ok(SqlStmt::Delete { table, where_clause })
            }
            _ => Err(self.unexpected("a SQL statement or block")),
        }
    }

    /// SELECT inside a block, with or without INTO.
    fn parse_select_in_block(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // SELECT
        let columns = self.parse_projection()?;
        if self.eat(&TokenKind::Into) {
            let mut into = vec![self.ident("a variable name")?];
            while self.eat(&TokenKind::Comma) {
                into.push(self.ident("a variable name")?);
            }
            self.consume(&TokenKind::From, "'FROM'")?;
            let table = self.ident("a table name")?;
            let where_clause = self.parse_where()?;
            let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
            return Ok(Stmt {
                kind: StmtKind::SelectInto { columns, into, table, where_clause },
                span: start.cover(end),
            });
        }
        self.consume(&TokenKind::From, "'FROM'")?;
        let table = self.ident("a table name")?;
        let where_clause = self.parse_where()?;
        let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
        Ok(Stmt {
            kind: StmtKind::Sql(SqlStmt::Select { columns, table, where_clause }),
            span: start.cover(end),
        })
    }

    fn parse_projection(&mut self) -> PResult<Projection> {
        if self.eat(&TokenKind::Star) {
            return Ok(Projection::Star);
        }
        let mut columns = vec![self.ident("a column name")?];
        while self.eat(&TokenKind::Comma) {
            // A trailing INTO keyword means the list is done.
            if self.at(&TokenKind::Into) {
                break;
            }
            columns.push(self.ident("a column name")?);
        }
        Ok(Projection::Columns(columns))
    }

    fn parse_where(&mut self) -> PResult<Option<Expr>> {
        if self.eat(&TokenKind::Where) {
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
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
                TokenKind::Concat => BinOp::Concat,
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
            TokenKind::DateLit(d) => {
                self.advance();
                Ok(Expr { kind: ExprKind::DateLit(d), span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr { kind: ExprKind::Null, span })
            }
            TokenKind::Ident(first) => {
                self.advance();
                let mut parts = vec![first];
                while self.at(&TokenKind::Dot) {
                    self.advance();
                    parts.push(self.ident("a name after '.'")?);
                }
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    let full = span.cover(self.prev_span());
                    return Ok(Expr {
                        kind: ExprKind::FuncCall { name: parts, args },
                        span: full,
                    });
                }
                if parts.len() == 1 {
                    Ok(Expr {
                        kind: ExprKind::Ident(parts.remove(0)),
                        span,
                    })
                } else {
                    Ok(Expr {
                        kind: ExprKind::Ident(parts.join(".")),
                        span: span.cover(self.prev_span()),
                    })
                }
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
    fn test_anonymous_block_scenario() {
        let script = parse_ok("BEGIN DBMS_OUTPUT.PUT_LINE('n=' || (2+3*4)); END;\n/");
        assert_eq!(script.items.len(), 1);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert_eq!(block.body.len(), 1);
                assert!(matches!(
                    &block.body[0].kind,
                    StmtKind::Call { name, .. }
                        if name == &vec!["DBMS_OUTPUT".to_string(), "PUT_LINE".to_string()]
                ));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_declare_section() {
        let src = "DECLARE n NUMBER := 3; s VARCHAR2(20); BEGIN n := n + 1; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert_eq!(block.decls.len(), 2);
                assert_eq!(block.decls[0].type_name, "NUMBER");
                assert_eq!(block.decls[1].type_name, "VARCHAR2(20)");
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_exception_section() {
        let src = "DECLARE e EXCEPTION; BEGIN RAISE e; EXCEPTION WHEN e THEN NULL; WHEN OTHERS THEN NULL; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert!(block.decls[0].is_exception());
                assert_eq!(block.handlers.len(), 2);
                assert_eq!(block.handlers[0].names, vec!["E".to_string()]);
                assert!(block.handlers[1].names.is_empty());
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_if_elsif_else() {
        let src = "BEGIN IF x > 1 THEN NULL; ELSIF x > 0 THEN NULL; ELSE NULL; END IF; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => match &block.body[0].kind {
                StmtKind::If { branches, orelse } => {
                    assert_eq!(branches.len(), 2);
                    assert_eq!(orelse.len(), 1);
                }
                other => panic!("expected if, got {other:?}"),
            },
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_for_range_loop() {
        let src = "BEGIN FOR i IN 1..3 LOOP DBMS_OUTPUT.PUT_LINE(i); END LOOP; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert!(matches!(
                    &block.body[0].kind,
                    StmtKind::ForRange { var, reverse: false, .. } if var == "I"
                ));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_exit_when() {
        let src = "BEGIN LOOP EXIT WHEN n > 3; END LOOP; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => match &block.body[0].kind {
                StmtKind::Loop { body } => {
                    assert!(matches!(body[0].kind, StmtKind::Exit { when: Some(_) }));
                }
                other => panic!("expected loop, got {other:?}"),
            },
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_sql_items_at_top_level() {
        let src = "CREATE TABLE t (id NUMBER, nm VARCHAR2(10));\nINSERT INTO t VALUES (1, 'a');\nSELECT * FROM t;";
        let script = parse_ok(src);
        assert_eq!(script.items.len(), 3);
        assert!(matches!(
            script.items[0].kind,
            ItemKind::Sql(SqlStmt::CreateTable { .. })
        ));
        assert!(matches!(
            script.items[1].kind,
            ItemKind::Sql(SqlStmt::Insert { .. })
        ));
        assert!(matches!(
            script.items[2].kind,
            ItemKind::Sql(SqlStmt::Select { .. })
        ));
    }

    #[test]
    fn test_select_into() {
        let src = "BEGIN SELECT nm INTO v_name FROM t WHERE id = 1; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert!(matches!(
                    &block.body[0].kind,
                    StmtKind::SelectInto { into, .. } if into == &vec!["V_NAME".to_string()]
                ));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_in_concat_expression() {
        // 2+3*4 must evaluate the product first.
        let script = parse_ok("BEGIN x := 'n=' || (2+3*4); END;");
        match &script.items[0].kind {
            ItemKind::Block(block) => match &block.body[0].kind {
                StmtKind::Assign { value, .. } => {
                    assert!(matches!(
                        &value.kind,
                        ExprKind::Binary { op: BinOp::Concat, .. }
                    ));
                }
                other => panic!("expected assign, got {other:?}"),
            },
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_to_next_item() {
        let src = "BEGIN bogus bogus; END;\nBEGIN DBMS_OUTPUT.PUT_LINE('ok'); END;";
        let (tokens, _) = lex(src);
        let (script, diags) = parse(&tokens, &AbortFlag::new());
        assert!(!diags.is_empty());
        assert!(!script.items.is_empty());
    }

    #[test]
    fn test_nested_block() {
        let src = "BEGIN BEGIN NULL; END; END;";
        let script = parse_ok(src);
        match &script.items[0].kind {
            ItemKind::Block(block) => {
                assert!(matches!(block.body[0].kind, StmtKind::Nested(_)));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }
}
