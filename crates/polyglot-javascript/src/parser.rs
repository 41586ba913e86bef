//! JavaScript parser — recursive descent with the C-family operator
//! precedence ladder and right-associative assignment.
//!
//! Recovery is per top-level item: on the first error inside a
//! statement the driver records the diagnostic and seeks to the next
//! `;` (or closing brace) at the current nesting depth.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    ArrowBody, BinOp, DeclKind, Expr, ExprKind, MemberProp, MethodDef, Program, Stmt, StmtKind,
    TemplateElem, UnaryOp,
};
use crate::token::{TemplatePart, Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.message)]
pub struct ParseError(pub Diagnostic);

/// Parse a token stream into a program plus parse diagnostics.
pub fn parse(tokens: &[Token], abort: &AbortFlag) -> (Program, Vec<Diagnostic>) {
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

    fn run(mut self, abort: &AbortFlag) -> (Program, Vec<Diagnostic>) {
        let start = self.current_span();
        let mut body = Vec::new();
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
            match self.parse_stmt() {
                Ok(stmt) => body.push(stmt),
                Err(ParseError(diag)) => {
                    self.diags.push(diag);
                    self.synchronize();
                }
            }
        }
        let span = match (body.first(), body.last()) {
            (Some(first), Some(last)) => first.span.cover(last.span),
            _ => start,
        };
        (Program { body, span }, self.diags)
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

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
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
                format!("expected {expected}, found {:?}", tok.kind),
            )
        };
        ParseError(Diagnostic::error(Stage::Parse, kind, message, tok.span))
    }

    /// Seek to the next `;` at depth zero, or a brace that closes the
    /// depth we started in.
    fn synchronize(&mut self) {
        let mut depth = 0i32;
        while !self.at(&TokenKind::Eof) {
            match &self.current().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth < 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Semicolon if depth <= 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Statement terminator: `;`, or an implicit one before `}` / EOF.
    fn end_stmt(&mut self) -> PResult<Span> {
        if self.at(&TokenKind::Semicolon) {
            return Ok(self.advance().span);
        }
        if self.at(&TokenKind::RBrace) || self.at(&TokenKind::Eof) {
            return Ok(self.prev_span());
        }
        Err(self.unexpected("';'"))
    }

    // -- statements ------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => self.parse_var_decl(start),
            TokenKind::Function => self.parse_function_decl(start),
            TokenKind::Class => self.parse_class_decl(start),
            TokenKind::Return => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon)
                    || self.at(&TokenKind::RBrace)
                    || self.at(&TokenKind::Eof)
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.end_stmt()?;
                Ok(Stmt { kind: StmtKind::Return(value), span: start.cover(end) })
            }
            TokenKind::If => self.parse_if(start),
            TokenKind::While => self.parse_while(start),
            TokenKind::For => self.parse_for(start),
            TokenKind::LBrace => {
                let (body, end) = self.parse_block()?;
                Ok(Stmt { kind: StmtKind::Block(body), span: start.cover(end) })
            }
            TokenKind::Break => {
                self.advance();
                let end = self.end_stmt()?;
                Ok(Stmt { kind: StmtKind::Break, span: start.cover(end) })
            }
            TokenKind::Continue => {
                self.advance();
                let end = self.end_stmt()?;
                Ok(Stmt { kind: StmtKind::Continue, span: start.cover(end) })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt { kind: StmtKind::Empty, span: start })
            }
            _ => {
                let expr = self.parse_expr()?;
                let end = self.end_stmt()?;
                Ok(Stmt { kind: StmtKind::ExprStmt(expr), span: start.cover(end) })
            }
        }
    }

    fn decl_kind(&mut self) -> DeclKind {
        let kind = match self.current().kind {
            TokenKind::Const => DeclKind::Const,
            TokenKind::Var => DeclKind::Var,
            _ => DeclKind::Let,
        };
        self.advance();
        kind
    }

    fn parse_var_decl(&mut self, start: Span) -> PResult<Stmt> {
        let decl = self.decl_kind();
        let name = self.ident("variable name")?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        let end = self.end_stmt()?;
        Ok(Stmt {
            kind: StmtKind::VarDecl { decl, name, init },
            span: start.cover(end),
        })
    }

    fn parse_function_decl(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // function
        let name = self.ident("function name")?;
        let params = self.parse_params()?;
        let (body, end) = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::FunctionDecl { name, params, body },
            span: start.cover(end),
        })
    }

    fn parse_class_decl(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // class
        let name = self.ident("class name")?;
        self.consume(&TokenKind::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            let method_start = self.current_span();
            let method_name = self.ident("method name")?;
            let params = self.parse_params()?;
            let (body, body_end) = self.parse_block()?;
            methods.push(MethodDef {
                name: method_name,
                params,
                body,
                span: method_start.cover(body_end),
            });
        }
        let close = self.consume(&TokenKind::RBrace, "'}'")?;
        Ok(Stmt {
            kind: StmtKind::ClassDecl { name, methods },
            span: start.cover(close.span),
        })
    }

    fn parse_if(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // if
        self.consume(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.consume(&TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map_or(then_branch.span, |e| e.span);
        Ok(Stmt {
            kind: StmtKind::If { cond, then_branch, else_branch },
            span: start.cover(end),
        })
    }

    fn parse_while(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // while
        self.consume(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.consume(&TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.cover(body.span);
        Ok(Stmt { kind: StmtKind::While { cond, body }, span })
    }

    fn parse_for(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // for
        self.consume(&TokenKind::LParen, "'('")?;

        // for-in / for-of with an optional declaration keyword.
        let decl = match self.current().kind {
            TokenKind::Let => Some(DeclKind::Let),
            TokenKind::Const => Some(DeclKind::Const),
            TokenKind::Var => Some(DeclKind::Var),
            _ => None,
        };
        let looks_foreach = {
            let name_idx = usize::from(decl.is_some());
            matches!(self.peek_kind(name_idx), Some(TokenKind::Ident(_)))
                && matches!(
                    self.peek_kind(name_idx + 1),
                    Some(TokenKind::In) | Some(TokenKind::Of)
                )
        };
        if looks_foreach {
            if decl.is_some() {
                self.advance();
            }
            let name = self.ident("loop variable")?;
            let of_loop = self.at(&TokenKind::Of);
            self.advance(); // in / of
            let subject = self.parse_expr()?;
            self.consume(&TokenKind::RParen, "')'")?;
            let body = Box::new(self.parse_stmt()?);
            let span = start.cover(body.span);
            return Ok(Stmt {
                kind: StmtKind::ForEach { decl, name, of_loop, subject, body },
                span,
            });
        }

        let init = if self.at(&TokenKind::Semicolon) {
            self.advance();
            None
        } else if decl.is_some() {
            let init_start = self.current_span();
            Some(Box::new(self.parse_var_decl(init_start)?))
        } else {
            let init_start = self.current_span();
            let expr = self.parse_expr()?;
            self.consume(&TokenKind::Semicolon, "';'")?;
            Some(Box::new(Stmt {
                kind: StmtKind::ExprStmt(expr),
                span: init_start,
            }))
        };
        let cond = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(&TokenKind::Semicolon, "';'")?;
        let update = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(&TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stmt()?);
        let span = start.cover(body.span);
        Ok(Stmt {
            kind: StmtKind::For { init, cond, update, body },
            span,
        })
    }

    fn parse_block(&mut self) -> PResult<(Vec<Stmt>, Span)> {
        self.consume(&TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        if self.at(&TokenKind::Eof) {
            return Err(ParseError(Diagnostic::error(
                Stage::Parse,
                DiagKind::BlockClosureMissing,
                "block is not closed before end of input",
                self.current_span(),
            )));
        }
        let close = self.advance().span;
        Ok((body, close))
    }

    fn parse_params(&mut self) -> PResult<Vec<String>> {
        self.consume(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                params.push(self.ident("parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RParen, "')'")?;
        Ok(params)
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

    // -- expressions -----------------------------------------------------

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let left = self.parse_conditional()?;
        let op = match self.current().kind {
            TokenKind::Assign => Some(None),
            TokenKind::PlusEq => Some(Some(BinOp::Add)),
            TokenKind::MinusEq => Some(Some(BinOp::Sub)),
            TokenKind::StarEq => Some(Some(BinOp::Mul)),
            TokenKind::SlashEq => Some(Some(BinOp::Div)),
            _ => None,
        };
        if let Some(op) = op {
            if !matches!(left.kind, ExprKind::Ident(_) | ExprKind::Member { .. }) {
                return Err(ParseError(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Unexpected,
                    "invalid assignment target",
                    left.span,
                )));
            }
            self.advance();
            let value = self.parse_assignment()?;
            let span = left.span.cover(value.span);
            return Ok(Expr {
                kind: ExprKind::Assign {
                    op,
                    target: Box::new(left),
                    value: Box::new(value),
                },
                span,
            });
        }
        Ok(left)
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_logical_or()?;
        if self.eat(&TokenKind::Question) {
            let consequent = self.parse_assignment()?;
            self.consume(&TokenKind::Colon, "':'")?;
            let alternate = self.parse_assignment()?;
            let span = test.span.cover(alternate.span);
            return Ok(Expr {
                kind: ExprKind::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                span,
            });
        }
        Ok(test)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.at(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_logical_and()?;
            let span = left.span.cover(right.span);
            left = Expr {
                kind: ExprKind::Logical { and: false, left: Box::new(left), right: Box::new(right) },
                span,
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_or()?;
        while self.at(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_bit_or()?;
            let span = left.span.cover(right.span);
            left = Expr {
                kind: ExprKind::Logical { and: true, left: Box::new(left), right: Box::new(right) },
                span,
            };
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_xor()?;
        while self.at(&TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bit_xor()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_and()?;
        while self.at(&TokenKind::Caret) {
            self.advance();
            let right = self.parse_bit_and()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.at(&TokenKind::Amp) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinOp::EqLoose,
                TokenKind::NotEq => BinOp::NeLoose,
                TokenKind::EqEqEq => BinOp::EqStrict,
                TokenKind::NotEqEq => BinOp::NeStrict,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
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
                TokenKind::StarStar => BinOp::Pow,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            if op == BinOp::Pow && self.at(&TokenKind::StarStar) {
                // `**` chains associate right: 2**3**2 is 2**(3**2).
                let mut chain = right;
                while self.at(&TokenKind::StarStar) {
                    self.advance();
                    let next = self.parse_unary()?;
                    chain = binary(BinOp::Pow, chain, next);
                }
                left = binary(BinOp::Pow, left, chain);
                continue;
            }
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Not => Some(UnaryOp::Not),
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
        if self.at(&TokenKind::PlusPlus) || self.at(&TokenKind::MinusMinus) {
            let inc = self.at(&TokenKind::PlusPlus);
            self.advance();
            let target = self.parse_unary()?;
            let span = start.cover(target.span);
            return Ok(Expr {
                kind: ExprKind::Update { inc, prefix: true, target: Box::new(target) },
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.at(&TokenKind::LParen) {
                let args = self.parse_args()?;
                let span = expr.span.cover(self.prev_span());
                expr = Expr {
                    kind: ExprKind::Call { callee: Box::new(expr), args },
                    span,
                };
            } else if self.at(&TokenKind::Dot) {
                self.advance();
                let name = self.ident("property name")?;
                let span = expr.span.cover(self.prev_span());
                expr = Expr {
                    kind: ExprKind::Member { obj: Box::new(expr), prop: MemberProp::Named(name) },
                    span,
                };
            } else if self.at(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                let close = self.consume(&TokenKind::RBracket, "']'")?;
                let span = expr.span.cover(close.span);
                expr = Expr {
                    kind: ExprKind::Member {
                        obj: Box::new(expr),
                        prop: MemberProp::Computed(Box::new(index)),
                    },
                    span,
                };
            } else if self.at(&TokenKind::PlusPlus) || self.at(&TokenKind::MinusMinus) {
                let inc = self.at(&TokenKind::PlusPlus);
                let end = self.advance().span;
                let span = expr.span.cover(end);
                expr = Expr {
                    kind: ExprKind::Update { inc, prefix: false, target: Box::new(expr) },
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.consume(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    /// Is `( ... ) =>` ahead? Decides arrow-parameter parsing.
    fn paren_starts_arrow(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1).map(|t| &t.kind),
                            Some(TokenKind::Arrow)
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_arrow_tail(&mut self, params: Vec<String>, start: Span) -> PResult<Expr> {
        self.consume(&TokenKind::Arrow, "'=>'")?;
        if self.at(&TokenKind::LBrace) {
            let (body, end) = self.parse_block()?;
            Ok(Expr {
                kind: ExprKind::Arrow { params, body: ArrowBody::Block(body) },
                span: start.cover(end),
            })
        } else {
            let body = self.parse_assignment()?;
            let span = start.cover(body.span);
            Ok(Expr {
                kind: ExprKind::Arrow { params, body: ArrowBody::Expr(Box::new(body)) },
                span,
            })
        }
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
            TokenKind::Template(parts) => {
                self.advance();
                let mut elems = Vec::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => elems.push(TemplateElem::Text(text)),
                        TemplatePart::Interp(raw) => {
                            let inner = self.parse_fragment(&raw, span)?;
                            elems.push(TemplateElem::Interp(Box::new(inner)));
                        }
                    }
                }
                Ok(Expr { kind: ExprKind::Template(elems), span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(true), span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(false), span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr { kind: ExprKind::Null, span })
            }
            TokenKind::Undefined => {
                self.advance();
                Ok(Expr { kind: ExprKind::Undefined, span })
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr { kind: ExprKind::This, span })
            }
            TokenKind::New => {
                self.advance();
                let callee = self.parse_postfix_no_call()?;
                let args = if self.at(&TokenKind::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                let full = span.cover(self.prev_span());
                Ok(Expr {
                    kind: ExprKind::New { callee: Box::new(callee), args },
                    span: full,
                })
            }
            TokenKind::Function => {
                self.advance();
                // Anonymous function expression.
                let params = self.parse_params()?;
                let (body, end) = self.parse_block()?;
                Ok(Expr {
                    kind: ExprKind::FunctionExpr { params, body },
                    span: span.cover(end),
                })
            }
            TokenKind::Ident(name) => {
                if matches!(self.peek_kind(1), Some(TokenKind::Arrow)) {
                    self.advance();
                    return self.parse_arrow_tail(vec![name], span);
                }
                self.advance();
                Ok(Expr { kind: ExprKind::Ident(name), span })
            }
            TokenKind::LParen => {
                if self.paren_starts_arrow() {
                    let params = self.parse_params()?;
                    return self.parse_arrow_tail(params, span);
                }
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_assignment()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(&TokenKind::RBracket, "']'")?;
                Ok(Expr {
                    kind: ExprKind::Array(items),
                    span: span.cover(close.span),
                })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut props = Vec::new();
                if !self.at(&TokenKind::RBrace) {
                    loop {
                        let key = match &self.current().kind {
                            TokenKind::Ident(name) => name.clone(),
                            TokenKind::Str(s) => s.clone(),
                            _ => return Err(self.unexpected("a property name")),
                        };
                        self.advance();
                        self.consume(&TokenKind::Colon, "':'")?;
                        let value = self.parse_assignment()?;
                        props.push((key, value));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(&TokenKind::RBrace, "'}'")?;
                Ok(Expr {
                    kind: ExprKind::Object(props),
                    span: span.cover(close.span),
                })
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Postfix chain without calls, for `new X.Y(...)`.
    fn parse_postfix_no_call(&mut self) -> PResult<Expr> {
        let mut expr = {
            let span = self.current_span();
            let name = self.ident("constructor name")?;
            Expr { kind: ExprKind::Ident(name), span }
        };
        while self.at(&TokenKind::Dot) {
            self.advance();
            let name = self.ident("property name")?;
            let span = expr.span.cover(self.prev_span());
            expr = Expr {
                kind: ExprKind::Member { obj: Box::new(expr), prop: MemberProp::Named(name) },
                span,
            };
        }
        Ok(expr)
    }

    /// Parse a detached source fragment (template interpolation).
    fn parse_fragment(&mut self, raw: &str, span: Span) -> PResult<Expr> {
        let (tokens, lex_diags) = crate::lexer::lex(raw);
        if let Some(diag) = lex_diags.into_iter().next() {
            return Err(ParseError(diag));
        }
        let mut sub = Parser::new(&tokens);
        let mut expr = sub.parse_expr()?;
        if !sub.at(&TokenKind::Eof) {
            return Err(sub.unexpected("end of interpolation"));
        }
        // Fragment offsets are meaningless outside the template; pin
        // every node to the template token's span.
        reset_span(&mut expr, span);
        Ok(expr)
    }
}

fn reset_span(expr: &mut Expr, span: Span) {
    expr.span = span;
    match &mut expr.kind {
        ExprKind::Unary { operand, .. } => reset_span(operand, span),
        ExprKind::Update { target, .. } => reset_span(target, span),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            reset_span(left, span);
            reset_span(right, span);
        }
        ExprKind::Conditional { test, consequent, alternate } => {
            reset_span(test, span);
            reset_span(consequent, span);
            reset_span(alternate, span);
        }
        ExprKind::Assign { target, value, .. } => {
            reset_span(target, span);
            reset_span(value, span);
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            reset_span(callee, span);
            for arg in args {
                reset_span(arg, span);
            }
        }
        ExprKind::Member { obj, prop } => {
            reset_span(obj, span);
            if let MemberProp::Computed(index) = prop {
                reset_span(index, span);
            }
        }
        ExprKind::Array(items) => {
            for item in items {
                reset_span(item, span);
            }
        }
        ExprKind::Object(props) => {
            for (_, value) in props {
                reset_span(value, span);
            }
        }
        ExprKind::Template(elems) => {
            for elem in elems {
                if let TemplateElem::Interp(inner) = elem {
                    reset_span(inner, span);
                }
            }
        }
        _ => {}
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

    fn parse_ok(src: &str) -> Program {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (program, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.is_empty(), "parse: {diags:?}");
        program
    }

    #[test]
    fn test_c_style_for() {
        let program = parse_ok("let t = 0;\nfor (let i=1; i<=4; i++) t += i;\nconsole.log(t);\n");
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.body[1].kind, StmtKind::For { .. }));
    }

    #[test]
    fn test_arrow_function_forms() {
        let program = parse_ok("const f = x => x + 1;\nconst g = (a, b) => { return a * b; };\n");
        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::VarDecl { init: Some(init), .. } => {
                    assert!(matches!(init.kind, ExprKind::Arrow { .. }));
                }
                other => panic!("expected decl, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_class_with_constructor() {
        let program = parse_ok(
            "class Point {\n  constructor(x) { this.x = x; }\n  get() { return this.x; }\n}\n",
        );
        match &program.body[0].kind {
            StmtKind::ClassDecl { name, methods } => {
                assert_eq!(name, "Point");
                assert_eq!(methods.len(), 2);
                assert_eq!(methods[0].name, "constructor");
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn test_ternary_and_assignment_are_expressions() {
        let program = parse_ok("let x = a > 0 ? 'pos' : 'neg';\n");
        match &program.body[0].kind {
            StmtKind::VarDecl { init: Some(init), .. } => {
                assert!(matches!(init.kind, ExprKind::Conditional { .. }));
            }
            other => panic!("expected decl, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_right_associative() {
        let program = parse_ok("a = b = 1;\n");
        match &program.body[0].kind {
            StmtKind::ExprStmt(expr) => match &expr.kind {
                ExprKind::Assign { value, .. } => {
                    assert!(matches!(value.kind, ExprKind::Assign { .. }));
                }
                other => panic!("expected assign, got {other:?}"),
            },
            other => panic!("expected expr stmt, got {other:?}"),
        }
    }

    #[test]
    fn test_template_literal_parsed() {
        let program = parse_ok("let s = `sum: ${1 + 2}`;\n");
        match &program.body[0].kind {
            StmtKind::VarDecl { init: Some(init), .. } => match &init.kind {
                ExprKind::Template(elems) => {
                    assert_eq!(elems.len(), 2);
                    assert!(matches!(elems[1], TemplateElem::Interp(_)));
                }
                other => panic!("expected template, got {other:?}"),
            },
            other => panic!("expected decl, got {other:?}"),
        }
    }

    #[test]
    fn test_for_of() {
        let program = parse_ok("for (const x of xs) { console.log(x); }\n");
        assert!(matches!(
            program.body[0].kind,
            StmtKind::ForEach { of_loop: true, .. }
        ));
    }

    #[test]
    fn test_new_expression() {
        let program = parse_ok("let p = new Point(1, 2);\n");
        match &program.body[0].kind {
            StmtKind::VarDecl { init: Some(init), .. } => {
                assert!(matches!(init.kind, ExprKind::New { .. }));
            }
            other => panic!("expected decl, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_to_next_statement() {
        let (tokens, _) = lex("let = 5;\nlet y = 2;\n");
        let (program, diags) = parse(&tokens, &AbortFlag::new());
        assert!(!diags.is_empty());
        assert!(program
            .body
            .iter()
            .any(|s| matches!(&s.kind, StmtKind::VarDecl { name, .. } if name == "y")));
    }

    #[test]
    fn test_unclosed_block() {
        let (tokens, _) = lex("function f() { let x = 1;");
        let (_, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.iter().any(|d| d.kind == DiagKind::BlockClosureMissing));
    }

    #[test]
    fn test_postfix_update_in_for() {
        let program = parse_ok("for (i = 0; i < 3; i++) ;\n");
        match &program.body[0].kind {
            StmtKind::For { update: Some(update), .. } => {
                assert!(matches!(update.kind, ExprKind::Update { prefix: false, .. }));
            }
            other => panic!("expected for, got {other:?}"),
        }
    }
}
