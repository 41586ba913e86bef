//! Python parser — recursive descent over the indentation-aware
//! token stream. `Indent`/`Dedent` are ordinary block brackets here.
//!
//! Recovery is per top-level item: the first error inside a statement
//! aborts that statement's parse and the driver seeks forward to the
//! next logical line at indentation depth zero.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{BinOp, Expr, ExprKind, Module, Stmt, StmtKind, UnaryOp};
use crate::token::{Token, TokenKind};

/// Internal parse interrupt: the diagnostic is already built; the
/// driver records it and resynchronizes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.message)]
pub struct ParseError(pub Diagnostic);

/// Parse a token stream into a module plus parse diagnostics.
pub fn parse(tokens: &[Token], abort: &AbortFlag) -> (Module, Vec<Diagnostic>) {
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

    fn run(mut self, abort: &AbortFlag) -> (Module, Vec<Diagnostic>) {
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
        (Module { body, span }, self.diags)
    }

    // -- cursor ----------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_span(&self) -> Span {
        self.current().span
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

    /// Advance over an expected token or raise the parse interrupt.
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

    /// Seek to the next logical line at indentation depth zero.
    fn synchronize(&mut self) {
        let mut depth = 0i32;
        while !self.at(&TokenKind::Eof) {
            match &self.current().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => depth -= 1,
                TokenKind::Newline if depth <= 0 => {
                    self.advance();
                    // Also swallow dedents that close the failed construct.
                    while self.at(&TokenKind::Dedent) {
                        self.advance();
                    }
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // -- statements ------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::Def => self.parse_def(start),
            TokenKind::If => self.parse_if(start),
            TokenKind::While => self.parse_while(start),
            TokenKind::For => self.parse_for(start),
            TokenKind::Return => {
                self.advance();
                let value = if self.at(&TokenKind::Newline) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.end_of_line()?;
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    span: start.cover(end),
                })
            }
            TokenKind::Break => {
                self.advance();
                let end = self.end_of_line()?;
                Ok(Stmt { kind: StmtKind::Break, span: start.cover(end) })
            }
            TokenKind::Continue => {
                self.advance();
                let end = self.end_of_line()?;
                Ok(Stmt { kind: StmtKind::Continue, span: start.cover(end) })
            }
            TokenKind::Pass => {
                self.advance();
                let end = self.end_of_line()?;
                Ok(Stmt { kind: StmtKind::Pass, span: start.cover(end) })
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expr()?;
                let detail = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let end = self.end_of_line()?;
                Ok(Stmt {
                    kind: StmtKind::Assert { test, detail },
                    span: start.cover(end),
                })
            }
            _ => self.parse_assign_or_expr(start),
        }
    }

    fn parse_assign_or_expr(&mut self, start: Span) -> PResult<Stmt> {
        let expr = self.parse_expr()?;
        let aug = match &self.current().kind {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = aug {
            self.require_target(&expr)?;
            self.advance();
            let value = self.parse_expr()?;
            let end = self.end_of_line()?;
            return Ok(Stmt {
                kind: StmtKind::AugAssign { target: expr, op, value },
                span: start.cover(end),
            });
        }
        if self.eat(&TokenKind::Assign) {
            self.require_target(&expr)?;
            let value = self.parse_expr()?;
            let end = self.end_of_line()?;
            return Ok(Stmt {
                kind: StmtKind::Assign { target: expr, value },
                span: start.cover(end),
            });
        }
        let end = self.end_of_line()?;
        Ok(Stmt {
            kind: StmtKind::ExprStmt(expr),
            span: start.cover(end),
        })
    }

    fn require_target(&self, expr: &Expr) -> PResult<()> {
        match expr.kind {
            ExprKind::Name(_) | ExprKind::Index { .. } | ExprKind::Attr { .. } => Ok(()),
            _ => Err(ParseError(Diagnostic::error(
                Stage::Parse,
                DiagKind::Unexpected,
                "cannot assign to this expression",
                expr.span,
            ))),
        }
    }

    fn parse_def(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // def
        let name = self.ident("function name")?;
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
        let body = self.parse_suite()?;
        let end = body.last().map_or(start, |s| s.span);
        Ok(Stmt {
            kind: StmtKind::FunctionDef { name, params, body },
            span: start.cover(end),
        })
    }

    fn parse_if(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // if
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_suite()?;
        branches.push((cond, body));
        let mut orelse = Vec::new();
        loop {
            if self.at(&TokenKind::Elif) {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_suite()?;
                branches.push((cond, body));
            } else if self.at(&TokenKind::Else) {
                self.advance();
                orelse = self.parse_suite()?;
                break;
            } else {
                break;
            }
        }
        let end = orelse
            .last()
            .map(|s| s.span)
            .or_else(|| branches.last().and_then(|(_, b)| b.last()).map(|s| s.span))
            .unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::If { branches, orelse },
            span: start.cover(end),
        })
    }

    fn parse_while(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // while
        let cond = self.parse_expr()?;
        let body = self.parse_suite()?;
        let end = body.last().map_or(start, |s| s.span);
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            span: start.cover(end),
        })
    }

    fn parse_for(&mut self, start: Span) -> PResult<Stmt> {
        self.advance(); // for
        let target = self.ident("loop variable")?;
        self.consume(&TokenKind::In, "'in'")?;
        let iter = self.parse_expr()?;
        let body = self.parse_suite()?;
        let end = body.last().map_or(start, |s| s.span);
        Ok(Stmt {
            kind: StmtKind::For { target, iter, body },
            span: start.cover(end),
        })
    }

    /// `: NEWLINE INDENT stmt+ DEDENT`
    fn parse_suite(&mut self) -> PResult<Vec<Stmt>> {
        self.consume(&TokenKind::Colon, "':'")?;
        self.consume(&TokenKind::Newline, "end of line")?;
        self.consume(&TokenKind::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        if !self.eat(&TokenKind::Dedent) {
            return Err(ParseError(Diagnostic::error(
                Stage::Parse,
                DiagKind::BlockClosureMissing,
                "block is not closed before end of input",
                self.current_span(),
            )));
        }
        Ok(body)
    }

    fn end_of_line(&mut self) -> PResult<Span> {
        let tok = self.consume(&TokenKind::Newline, "end of line")?;
        Ok(tok.span)
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
        let mut left = self.parse_bit_or()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_bit_or()?;
            left = binary(op, left, right);
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
        let mut left = self.parse_shift()?;
        while self.at(&TokenKind::Amp) {
            self.advance();
            let right = self.parse_shift()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match &self.current().kind {
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
            let op = match &self.current().kind {
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
            let op = match &self.current().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::SlashSlash => BinOp::FloorDiv,
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
        let op = match &self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.cover(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary { op, operand: Box::new(operand) },
                span,
            });
        }
        self.parse_power()
    }

    /// `**` binds tighter than unary and associates right.
    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if self.at(&TokenKind::StarStar) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
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
                let span = expr.span.cover(close.span);
                expr = Expr {
                    kind: ExprKind::Call { func: Box::new(expr), args },
                    span,
                };
            } else if self.at(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                let close = self.consume(&TokenKind::RBracket, "']'")?;
                let span = expr.span.cover(close.span);
                expr = Expr {
                    kind: ExprKind::Index { obj: Box::new(expr), index: Box::new(index) },
                    span,
                };
            } else if self.at(&TokenKind::Dot) {
                self.advance();
                let name = self.ident("attribute name")?;
                let span = expr.span.cover(self.tokens[self.pos - 1].span);
                expr = Expr {
                    kind: ExprKind::Attr { obj: Box::new(expr), name },
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.current().clone();
        let span = tok.span;
        let kind = match tok.kind {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(x) => {
                self.advance();
                ExprKind::Float(x)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::None => {
                self.advance();
                ExprKind::NoneLit
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(&TokenKind::RBracket, "']'")?;
                return Ok(Expr {
                    kind: ExprKind::List(items),
                    span: span.cover(close.span),
                });
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !self.at(&TokenKind::RBrace) {
                    loop {
                        let key = self.parse_expr()?;
                        self.consume(&TokenKind::Colon, "':'")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(&TokenKind::RBrace, "'}'")?;
                return Ok(Expr {
                    kind: ExprKind::Dict(entries),
                    span: span.cover(close.span),
                });
            }
            _ => return Err(self.unexpected("an expression")),
        };
        Ok(Expr { kind, span })
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.cover(right.span);
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
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

    fn parse_src(src: &str) -> (Module, Vec<Diagnostic>) {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex failed: {lex_diags:?}");
        parse(&tokens, &AbortFlag::new())
    }

    fn parse_ok(src: &str) -> Module {
        let (module, diags) = parse_src(src);
        assert!(diags.is_empty(), "parse failed: {diags:?}");
        module
    }

    #[test]
    fn test_function_def_and_call() {
        let module = parse_ok("def add(a,b):\n    return a+b\n\nprint(add(2,3))\n");
        assert_eq!(module.body.len(), 2);
        assert!(matches!(
            module.body[0].kind,
            StmtKind::FunctionDef { ref name, ref params, .. } if name == "add" && params.len() == 2
        ));
        assert!(matches!(module.body[1].kind, StmtKind::ExprStmt(_)));
    }

    #[test]
    fn test_if_elif_else() {
        let module = parse_ok("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        match &module.body[0].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(orelse.len(), 1);
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_power_right_associative() {
        let module = parse_ok("x = 2 ** 3 ** 2\n");
        match &module.body[0].kind {
            StmtKind::Assign { value, .. } => match &value.kind {
                ExprKind::Binary { op: BinOp::Pow, right, .. } => {
                    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
                }
                other => panic!("expected power, got {other:?}"),
            },
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let module = parse_ok("x = 1 + 2 * 3\n");
        match &module.body[0].kind {
            StmtKind::Assign { value, .. } => match &value.kind {
                ExprKind::Binary { op: BinOp::Add, right, .. } => {
                    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
                }
                other => panic!("expected add at top, got {other:?}"),
            },
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn test_for_loop() {
        let module = parse_ok("for i in range(3):\n    print(i)\n");
        assert!(matches!(
            module.body[0].kind,
            StmtKind::For { ref target, .. } if target == "i"
        ));
    }

    #[test]
    fn test_aug_assign() {
        let module = parse_ok("t += 1\n");
        assert!(matches!(
            module.body[0].kind,
            StmtKind::AugAssign { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn test_list_and_dict_literals() {
        let module = parse_ok("x = [1, 2]\ny = {'a': 1}\n");
        assert!(matches!(
            module.body[0].kind,
            StmtKind::Assign { ref value, .. } if matches!(value.kind, ExprKind::List(_))
        ));
        assert!(matches!(
            module.body[1].kind,
            StmtKind::Assign { ref value, .. } if matches!(value.kind, ExprKind::Dict(_))
        ));
    }

    #[test]
    fn test_error_recovers_to_next_item() {
        let (module, diags) = parse_src("x = = 1\ny = 2\n");
        assert!(!diags.is_empty());
        assert!(diags.iter().any(|d| d.kind == DiagKind::Unexpected));
        // The second line still parses.
        assert!(module
            .body
            .iter()
            .any(|s| matches!(s.kind, StmtKind::Assign { .. })));
    }

    #[test]
    fn test_unexpected_eof_inside_block() {
        let (tokens, _) = lex("def f():\n");
        let (_, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::UnexpectedEof || d.kind == DiagKind::BlockClosureMissing));
    }

    #[test]
    fn test_node_spans_cover_statement() {
        let module = parse_ok("x = 1 + 2\n");
        let span = module.body[0].span;
        assert_eq!(span.line, 1);
        assert_eq!(span.col, 1);
        assert!(span.len >= 9);
    }

    #[test]
    fn test_assert_statement() {
        let module = parse_ok("assert x > 0, 'positive'\n");
        assert!(matches!(
            module.body[0].kind,
            StmtKind::Assert { detail: Some(_), .. }
        ));
    }
}
