//! C++ parser — recursive descent over the preprocessor-aware token
//! stream. Top-level items are preprocessor lines, `using namespace`,
//! and typed function/variable definitions.
//!
//! Class and struct bodies are recognized and rejected with a clean
//! diagnostic; the parser recovers at the matching closing brace.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    BinOp, Expr, ExprKind, Item, ItemKind, ParamDecl, Stmt, StmtKind, TranslationUnit, Type,
    UnaryOp,
};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.message)]
pub struct ParseError(pub Diagnostic);

/// Parse a token stream into a translation unit plus diagnostics.
pub fn parse(tokens: &[Token], abort: &AbortFlag) -> (TranslationUnit, Vec<Diagnostic>) {
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

    fn run(mut self, abort: &AbortFlag) -> (TranslationUnit, Vec<Diagnostic>) {
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
            match self.parse_item() {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
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
        (TranslationUnit { items, span }, self.diags)
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

    fn synchronize(&mut self) {
        let mut depth = 0i32;
        while !self.at(&TokenKind::Eof) {
            match self.current().kind {
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

    /// Skip a brace-balanced run starting at the current `{`.
    fn skip_braced(&mut self) {
        let mut depth = 0i32;
        while !self.at(&TokenKind::Eof) {
            match self.current().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
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

    // -- items -----------------------------------------------------------

    fn parse_item(&mut self) -> PResult<Option<Item>> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::Preproc(payload) => {
                let payload = payload.clone();
                self.advance();
                Ok(Some(Item { kind: ItemKind::Preproc(payload), span: start }))
            }
            TokenKind::Using => {
                self.advance();
                self.consume(&TokenKind::Namespace, "'namespace'")?;
                let name = self.ident("namespace name")?;
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Some(Item {
                    kind: ItemKind::UsingNamespace(name),
                    span: start.cover(end),
                }))
            }
            TokenKind::Class | TokenKind::Struct => {
                self.advance();
                let _name = self.ident("class name")?;
                if self.at(&TokenKind::LBrace) {
                    // Class bodies are outside the supported subset.
                    self.diags.push(Diagnostic::error(
                        Stage::Parse,
                        DiagKind::Unexpected,
                        "class bodies are not supported",
                        self.current_span(),
                    ));
                    self.skip_braced();
                }
                let _ = self.eat(&TokenKind::Semicolon);
                Ok(None)
            }
            _ => {
                let ty = self.parse_type()?;
                let name = self.ident("a declarator name")?;
                if self.at(&TokenKind::LParen) {
                    let params = self.parse_param_list()?;
                    self.consume(&TokenKind::LBrace, "'{'")?;
                    let body = self.parse_block_body()?;
                    let end = self.prev_span();
                    Ok(Some(Item {
                        kind: ItemKind::Function { return_type: ty, name, params, body },
                        span: start.cover(end),
                    }))
                } else {
                    let init = if self.eat(&TokenKind::Assign) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                    Ok(Some(Item {
                        kind: ItemKind::GlobalVar { ty, name, init },
                        span: start.cover(end),
                    }))
                }
            }
        }
    }

    fn parse_param_list(&mut self) -> PResult<Vec<ParamDecl>> {
        self.consume(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let name = self.ident("parameter name")?;
                params.push(ParamDecl { ty, name });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RParen, "')'")?;
        Ok(params)
    }

    /// Parse a type: `[const] base[::part]* [*]* [&]`.
    fn parse_type(&mut self) -> PResult<Type> {
        let mut is_const = false;
        while self.at(&TokenKind::KwConst) {
            is_const = true;
            self.advance();
        }
        let mut base = Vec::new();
        match &self.current().kind {
            TokenKind::KwInt => { self.advance(); base.push("int".to_string()); }
            TokenKind::KwFloat => { self.advance(); base.push("float".to_string()); }
            TokenKind::KwDouble => { self.advance(); base.push("double".to_string()); }
            TokenKind::KwChar => { self.advance(); base.push("char".to_string()); }
            TokenKind::KwBool => { self.advance(); base.push("bool".to_string()); }
            TokenKind::KwVoid => { self.advance(); base.push("void".to_string()); }
            TokenKind::KwAuto => { self.advance(); base.push("auto".to_string()); }
            TokenKind::Ident(name) => {
                base.push(name.clone());
                self.advance();
                while self.at(&TokenKind::ColonColon) {
                    self.advance();
                    base.push(self.ident("name after '::'")?);
                }
            }
            _ => return Err(self.unexpected("a type")),
        }
        let mut pointer = 0u8;
        while self.at(&TokenKind::Star) {
            pointer += 1;
            self.advance();
        }
        let reference = self.eat(&TokenKind::Amp);
        Ok(Type { is_const, base, pointer, reference })
    }

    // -- statements ------------------------------------------------------

    /// Statements until the closing `}` of the current block.
    fn parse_block_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        if !self.eat(&TokenKind::RBrace) {
            return Err(ParseError(Diagnostic::error(
                Stage::Parse,
                DiagKind::BlockClosureMissing,
                "block is not closed before end of input",
                self.current_span(),
            )));
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::LBrace => {
                self.advance();
                let body = self.parse_block_body()?;
                Ok(Stmt { kind: StmtKind::Block(body), span: start.cover(self.prev_span()) })
            }
            TokenKind::If => {
                self.advance();
                self.consume(&TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::RParen, "')'")?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.eat(&TokenKind::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                let end = else_branch.as_ref().map_or(then_branch.span, |e| e.span);
                Ok(Stmt {
                    kind: StmtKind::If { cond, then_branch, else_branch },
                    span: start.cover(end),
                })
            }
            TokenKind::While => {
                self.advance();
                self.consume(&TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::RParen, "')'")?;
                let body = Box::new(self.parse_stmt()?);
                let span = start.cover(body.span);
                Ok(Stmt { kind: StmtKind::While { cond, body }, span })
            }
            TokenKind::For => {
                self.advance();
                self.consume(&TokenKind::LParen, "'('")?;
                let init = if self.eat(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt()?))
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
                Ok(Stmt { kind: StmtKind::For { init, cond, update, body }, span })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Return(value), span: start.cover(end) })
            }
            TokenKind::Break => {
                self.advance();
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Break, span: start.cover(end) })
            }
            TokenKind::Continue => {
                self.advance();
                let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                Ok(Stmt { kind: StmtKind::Continue, span: start.cover(end) })
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt { kind: StmtKind::Empty, span: start })
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                Ok(stmt)
            }
        }
    }

    /// A declaration or expression statement, `;` included.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        if self.starts_declaration() {
            let ty = self.parse_type()?;
            let name = self.ident("variable name")?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
            return Ok(Stmt {
                kind: StmtKind::VarDecl { ty, name, init },
                span: start.cover(end),
            });
        }
        let expr = self.parse_expr()?;
        let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
        Ok(Stmt { kind: StmtKind::ExprStmt(expr), span: start.cover(end) })
    }

    /// Type keyword, or `Ident [::Ident]* Ident` — a declaration.
    fn starts_declaration(&self) -> bool {
        if self.current().kind.starts_type() {
            return true;
        }
        // `name name` or `ns::name name` shapes.
        let mut i = self.pos;
        if !matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Ident(_))) {
            return false;
        }
        i += 1;
        while matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::ColonColon)) {
            if !matches!(
                self.tokens.get(i + 1).map(|t| &t.kind),
                Some(TokenKind::Ident(_))
            ) {
                return false;
            }
            i += 2;
        }
        while matches!(
            self.tokens.get(i).map(|t| &t.kind),
            Some(TokenKind::Star) | Some(TokenKind::Amp)
        ) {
            i += 1;
        }
        matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Ident(_)))
    }

    // -- expressions -----------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
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
            if !matches!(
                left.kind,
                ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
            ) {
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
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_or()?;
        while self.at(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_bit_or()?;
            left = binary(BinOp::And, left, right);
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
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
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
                self.advance();
                let mut args = Vec::new();
                if !self.at(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(&TokenKind::RParen, "')'")?;
                let span = expr.span.cover(close.span);
                expr = Expr {
                    kind: ExprKind::Call { callee: Box::new(expr), args },
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
                let name = self.ident("member name")?;
                let span = expr.span.cover(self.prev_span());
                expr = Expr {
                    kind: ExprKind::Member { obj: Box::new(expr), name },
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
            TokenKind::CharLit(c) => {
                self.advance();
                Ok(Expr { kind: ExprKind::CharLit(c), span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(true), span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(false), span })
            }
            TokenKind::Ident(first) => {
                self.advance();
                let mut parts = vec![first];
                while self.at(&TokenKind::ColonColon) {
                    self.advance();
                    parts.push(self.ident("name after '::'")?);
                }
                let full = span.cover(self.prev_span());
                Ok(Expr { kind: ExprKind::Ident(parts), span: full })
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

    fn parse_ok(src: &str) -> TranslationUnit {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (unit, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.is_empty(), "parse: {diags:?}");
        unit
    }

    #[test]
    fn test_hello_world_shape() {
        let src = "#include <iostream>\nusing namespace std;\nint main() {\n    cout << \"hi\" << endl;\n    return 0;\n}\n";
        let unit = parse_ok(src);
        assert_eq!(unit.items.len(), 3);
        assert!(matches!(unit.items[0].kind, ItemKind::Preproc(_)));
        assert!(matches!(
            unit.items[1].kind,
            ItemKind::UsingNamespace(ref n) if n == "std"
        ));
        assert!(matches!(
            unit.items[2].kind,
            ItemKind::Function { ref name, .. } if name == "main"
        ));
    }

    #[test]
    fn test_function_params_typed() {
        let unit = parse_ok("int add(int a, int b) { return a + b; }\n");
        match &unit.items[0].kind {
            ItemKind::Function { params, return_type, .. } => {
                assert_eq!(params.len(), 2);
                assert_eq!(return_type.base, vec!["int".to_string()]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_type_with_pointer_and_reference() {
        let unit = parse_ok("void f(const std::string& s, int* p) { }\n");
        match &unit.items[0].kind {
            ItemKind::Function { params, .. } => {
                assert!(params[0].ty.is_const);
                assert!(params[0].ty.reference);
                assert_eq!(params[0].ty.base, vec!["std".to_string(), "string".to_string()]);
                assert_eq!(params[1].ty.pointer, 1);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_qualified_ident_expression() {
        let unit = parse_ok("int main() { std::cout << 1; return 0; }\n");
        match &unit.items[0].kind {
            ItemKind::Function { body, .. } => match &body[0].kind {
                StmtKind::ExprStmt(expr) => match &expr.kind {
                    ExprKind::Binary { op: BinOp::Shl, left, .. } => {
                        assert!(matches!(
                            &left.kind,
                            ExprKind::Ident(parts) if parts == &vec!["std".to_string(), "cout".to_string()]
                        ));
                    }
                    other => panic!("expected shl, got {other:?}"),
                },
                other => panic!("expected expr stmt, got {other:?}"),
            },
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_class_body_rejected_cleanly() {
        let src = "class Point { int x; };\nint main() { return 0; }\n";
        let (tokens, _) = lex(src);
        let (unit, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags
            .iter()
            .any(|d| d.message.contains("class bodies are not supported")));
        // Parsing recovered: main still present.
        assert!(unit
            .items
            .iter()
            .any(|i| matches!(&i.kind, ItemKind::Function { name, .. } if name == "main")));
    }

    #[test]
    fn test_for_loop() {
        let src = "int main() { for (int i = 0; i < 3; i++) { } return 0; }\n";
        let unit = parse_ok(src);
        match &unit.items[0].kind {
            ItemKind::Function { body, .. } => {
                assert!(matches!(body[0].kind, StmtKind::For { .. }));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_auto_declaration() {
        let unit = parse_ok("int main() { auto x = 1; return x; }\n");
        match &unit.items[0].kind {
            ItemKind::Function { body, .. } => {
                assert!(matches!(
                    &body[0].kind,
                    StmtKind::VarDecl { ty, .. } if ty.base == vec!["auto".to_string()]
                ));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_global_variable() {
        let unit = parse_ok("int counter = 0;\n");
        assert!(matches!(unit.items[0].kind, ItemKind::GlobalVar { .. }));
    }

    #[test]
    fn test_recovery_after_bad_item() {
        let (tokens, _) = lex("int = 5;\nint ok() { return 1; }\n");
        let (unit, diags) = parse(&tokens, &AbortFlag::new());
        assert!(!diags.is_empty());
        assert!(unit
            .items
            .iter()
            .any(|i| matches!(&i.kind, ItemKind::Function { name, .. } if name == "ok")));
    }
}
