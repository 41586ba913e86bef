//! Pascal parser — recursive descent with the classic Pascal operator
//! tiers: `not`/unary sign, then `* / div mod and`, then `+ - or`,
//! then the relational operators.
//!
//! Recovery is per top-level item; on an error the driver seeks the
//! next `;` outside `begin`/`end` nesting.

use polyglot_lang_core::{AbortFlag, DiagKind, Diagnostic, Span, Stage};

use crate::ast::{
    BinOp, Decl, DeclKind, Expr, ExprKind, Param, Program, Routine, Stmt, StmtKind, UnaryOp,
};
use crate::token::{Token, TokenKind};

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
        let mut name = String::new();
        let mut decls = Vec::new();
        let mut body = Vec::new();

        // `program <name>;` header is optional in this subset.
        if self.eat(&TokenKind::Program) {
            match self.ident("program name") {
                Ok(n) => name = n,
                Err(ParseError(diag)) => self.diags.push(diag),
            }
            let _ = self.eat(&TokenKind::Semicolon);
        }

        // Declaration sections until the main `begin`.
        while !self.at(&TokenKind::Begin) && !self.at(&TokenKind::Eof) {
            if abort.is_set() {
                self.diags.push(Diagnostic::error(
                    Stage::Parse,
                    DiagKind::Cancelled,
                    "parse cancelled",
                    self.current_span(),
                ));
                break;
            }
            match self.parse_decl_section(&mut decls) {
                Ok(()) => {}
                Err(ParseError(diag)) => {
                    self.diags.push(diag);
                    self.synchronize();
                }
            }
        }

        if self.eat(&TokenKind::Begin) {
            match self.parse_stmt_list(&TokenKind::End) {
                Ok(stmts) => {
                    body = stmts;
                    if !self.eat(&TokenKind::End) {
                        self.diags.push(Diagnostic::error(
                            Stage::Parse,
                            DiagKind::BlockClosureMissing,
                            "'end' expected before end of input",
                            self.current_span(),
                        ));
                    }
                    let _ = self.eat(&TokenKind::Dot);
                }
                Err(ParseError(diag)) => self.diags.push(diag),
            }
        } else if self.at(&TokenKind::Eof) && !self.diags.iter().any(|d| d.is_error()) {
            self.diags.push(Diagnostic::error(
                Stage::Parse,
                DiagKind::UnexpectedEof,
                "unexpected end of input (expected 'begin')",
                self.current_span(),
            ));
        }

        let span = start.cover(self.prev_span());
        (Program { name, decls, body, span }, self.diags)
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
                TokenKind::Begin => depth += 1,
                TokenKind::End => depth -= 1,
                TokenKind::Semicolon if depth <= 0 => {
                    self.advance();
                    return;
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

    // -- declarations ----------------------------------------------------

    fn parse_decl_section(&mut self, decls: &mut Vec<Decl>) -> PResult<()> {
        match self.current().kind {
            TokenKind::Var => {
                self.advance();
                // One or more `names : type ;` groups.
                while matches!(self.current().kind, TokenKind::Ident(_)) {
                    let start = self.current_span();
                    let mut names = vec![self.ident("variable name")?];
                    while self.eat(&TokenKind::Comma) {
                        names.push(self.ident("variable name")?);
                    }
                    self.consume(&TokenKind::Colon, "':'")?;
                    let type_name = self.ident("type name")?;
                    let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                    decls.push(Decl {
                        kind: DeclKind::VarGroup { names, type_name },
                        span: start.cover(end),
                    });
                }
                Ok(())
            }
            TokenKind::Const => {
                self.advance();
                while matches!(self.current().kind, TokenKind::Ident(_)) {
                    let start = self.current_span();
                    let name = self.ident("constant name")?;
                    self.consume(&TokenKind::Eq, "'='")?;
                    let value = self.parse_expr()?;
                    let end = self.consume(&TokenKind::Semicolon, "';'")?.span;
                    decls.push(Decl {
                        kind: DeclKind::ConstDef { name, value },
                        span: start.cover(end),
                    });
                }
                Ok(())
            }
            TokenKind::Procedure => {
                let routine = self.parse_routine(false)?;
                let span = routine.span;
                decls.push(Decl { kind: DeclKind::Routine(routine), span });
                Ok(())
            }
            TokenKind::Function => {
                let routine = self.parse_routine(true)?;
                let span = routine.span;
                decls.push(Decl { kind: DeclKind::Routine(routine), span });
                Ok(())
            }
            _ => Err(self.unexpected("'var', 'const', 'procedure', 'function', or 'begin'")),
        }
    }

    fn parse_routine(&mut self, is_function: bool) -> PResult<Routine> {
        let start = self.current_span();
        self.advance(); // procedure / function
        let name = self.ident("routine name")?;

        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                // `var` parameters are treated as value parameters here.
                let _ = self.eat(&TokenKind::Var);
                let mut names = vec![self.ident("parameter name")?];
                while self.eat(&TokenKind::Comma) {
                    names.push(self.ident("parameter name")?);
                }
                self.consume(&TokenKind::Colon, "':'")?;
                let type_name = self.ident("type name")?;
                for name in names {
                    params.push(Param { name, type_name: type_name.clone() });
                }
                if !self.eat(&TokenKind::Semicolon) {
                    break;
                }
            }
            self.consume(&TokenKind::RParen, "')'")?;
        }

        let return_type = if is_function {
            self.consume(&TokenKind::Colon, "':'")?;
            Some(self.ident("return type")?)
        } else {
            None
        };
        self.consume(&TokenKind::Semicolon, "';'")?;

        let mut decls = Vec::new();
        while !self.at(&TokenKind::Begin) && !self.at(&TokenKind::Eof) {
            self.parse_decl_section(&mut decls)?;
        }
        self.consume(&TokenKind::Begin, "'begin'")?;
        let body = self.parse_stmt_list(&TokenKind::End)?;
        self.consume(&TokenKind::End, "'end'")?;
        let end = self.consume(&TokenKind::Semicolon, "';'")?.span;

        Ok(Routine {
            name,
            params,
            return_type,
            decls,
            body,
            span: start.cover(end),
        })
    }

    // -- statements ------------------------------------------------------

    /// Statements separated by `;` until (not consuming) `terminator`.
    fn parse_stmt_list(&mut self, terminator: &TokenKind) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&TokenKind::Semicolon) {}
            if self.at(terminator) || self.at(&TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
            if !self.at(&TokenKind::Semicolon) {
                break;
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match &self.current().kind {
            TokenKind::Begin => {
                self.advance();
                let body = self.parse_stmt_list(&TokenKind::End)?;
                let end = self.consume(&TokenKind::End, "'end'")?.span;
                Ok(Stmt { kind: StmtKind::Compound(body), span: start.cover(end) })
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::Then, "'then'")?;
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
                let cond = self.parse_expr()?;
                self.consume(&TokenKind::Do, "'do'")?;
                let body = Box::new(self.parse_stmt()?);
                let span = start.cover(body.span);
                Ok(Stmt { kind: StmtKind::While { cond, body }, span })
            }
            TokenKind::For => {
                self.advance();
                let var = self.ident("loop variable")?;
                self.consume(&TokenKind::Assign, "':='")?;
                let from = self.parse_expr()?;
                let downto = if self.eat(&TokenKind::To) {
                    false
                } else if self.eat(&TokenKind::Downto) {
                    true
                } else {
                    return Err(self.unexpected("'to' or 'downto'"));
                };
                let to = self.parse_expr()?;
                self.consume(&TokenKind::Do, "'do'")?;
                let body = Box::new(self.parse_stmt()?);
                let span = start.cover(body.span);
                Ok(Stmt {
                    kind: StmtKind::For { var, from, to, downto, body },
                    span,
                })
            }
            TokenKind::Repeat => {
                self.advance();
                let body = self.parse_stmt_list(&TokenKind::Until)?;
                self.consume(&TokenKind::Until, "'until'")?;
                let until = self.parse_expr()?;
                let span = start.cover(until.span);
                Ok(Stmt { kind: StmtKind::Repeat { body, until }, span })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt { kind: StmtKind::Break, span: start })
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt { kind: StmtKind::Continue, span: start })
            }
            TokenKind::Ident(_) => {
                let name = self.ident("identifier")?;
                if self.eat(&TokenKind::Assign) {
                    let value = self.parse_expr()?;
                    let span = start.cover(value.span);
                    Ok(Stmt { kind: StmtKind::Assign { target: name, value }, span })
                } else if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    let span = start.cover(self.prev_span());
                    Ok(Stmt { kind: StmtKind::Call { name, args }, span })
                } else {
                    // Argument-less procedure statement: `clrscr;`
                    Ok(Stmt {
                        kind: StmtKind::Call { name, args: Vec::new() },
                        span: start,
                    })
                }
            }
            _ => Err(self.unexpected("a statement")),
        }
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

    // -- expressions -----------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
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
                TokenKind::Or => BinOp::Or,
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
                TokenKind::Slash => BinOp::Divide,
                TokenKind::Div => BinOp::IntDiv,
                TokenKind::Mod => BinOp::Mod,
                TokenKind::And => BinOp::And,
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
            TokenKind::Not => Some(UnaryOp::Not),
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
            TokenKind::Real(x) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Real(x), span })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr { kind: ExprKind::Str(s), span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(true), span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr { kind: ExprKind::Bool(false), span })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    let full = span.cover(self.prev_span());
                    Ok(Expr { kind: ExprKind::Call { name, args }, span: full })
                } else {
                    Ok(Expr { kind: ExprKind::Ident(name), span })
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

    fn parse_ok(src: &str) -> Program {
        let (tokens, lex_diags) = lex(src);
        assert!(lex_diags.is_empty(), "lex: {lex_diags:?}");
        let (program, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags.is_empty(), "parse: {diags:?}");
        program
    }

    #[test]
    fn test_program_scenario() {
        let program = parse_ok("program t; var x:integer; begin x := 7; writeln('x=', x); end.");
        assert_eq!(program.name, "t");
        assert_eq!(program.decls.len(), 1);
        assert_eq!(program.body.len(), 2);
        assert!(matches!(
            program.body[1].kind,
            StmtKind::Call { ref name, .. } if name == "writeln"
        ));
    }

    #[test]
    fn test_var_group_with_multiple_names() {
        let program = parse_ok("program p; var a, b: integer; begin end.");
        match &program.decls[0].kind {
            DeclKind::VarGroup { names, type_name } => {
                assert_eq!(names, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(type_name, "integer");
            }
            other => panic!("expected var group, got {other:?}"),
        }
    }

    #[test]
    fn test_function_declaration() {
        let src = "program p;\nfunction sq(n: integer): integer;\nbegin sq := n * n; end;\nbegin writeln(sq(4)); end.";
        let program = parse_ok(src);
        match &program.decls[0].kind {
            DeclKind::Routine(routine) => {
                assert_eq!(routine.name, "sq");
                assert_eq!(routine.params.len(), 1);
                assert_eq!(routine.return_type.as_deref(), Some("integer"));
            }
            other => panic!("expected routine, got {other:?}"),
        }
    }

    #[test]
    fn test_for_downto() {
        let program = parse_ok("program p; var i: integer; begin for i := 3 downto 1 do writeln(i); end.");
        assert!(matches!(
            program.body[0].kind,
            StmtKind::For { downto: true, .. }
        ));
    }

    #[test]
    fn test_repeat_until() {
        let program =
            parse_ok("program p; var i: integer; begin i := 0; repeat i := i + 1 until i > 2; end.");
        assert!(matches!(program.body[1].kind, StmtKind::Repeat { .. }));
    }

    #[test]
    fn test_and_binds_like_multiplication() {
        // `a and b or c` parses as (a and b) or c.
        let program = parse_ok("program p; var a, b, c, r: boolean; begin r := a and b or c; end.");
        match &program.body[0].kind {
            StmtKind::Assign { value, .. } => match &value.kind {
                ExprKind::Binary { op: BinOp::Or, left, .. } => {
                    assert!(matches!(left.kind, ExprKind::Binary { op: BinOp::And, .. }));
                }
                other => panic!("expected or at top, got {other:?}"),
            },
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_end_flagged() {
        let (tokens, _) = lex("program p; begin x := 1;");
        let (_, diags) = parse(&tokens, &AbortFlag::new());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagKind::BlockClosureMissing || d.kind == DiagKind::UnexpectedEof));
    }

    #[test]
    fn test_recovery_in_declarations() {
        let (tokens, _) = lex("program p; var x: ; var y: integer; begin y := 1; end.");
        let (program, diags) = parse(&tokens, &AbortFlag::new());
        assert!(!diags.is_empty());
        // Later declarations and the body still parse.
        assert!(!program.body.is_empty());
    }

    #[test]
    fn test_nested_procedure() {
        let src = "program p;\nprocedure outer;\n  procedure inner;\n  begin writeln('i'); end;\nbegin inner; end;\nbegin outer; end.";
        let program = parse_ok(src);
        match &program.decls[0].kind {
            DeclKind::Routine(routine) => {
                assert!(matches!(routine.decls[0].kind, DeclKind::Routine(_)));
            }
            other => panic!("expected routine, got {other:?}"),
        }
    }
}
