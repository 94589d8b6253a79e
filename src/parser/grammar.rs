//! Recursive-descent parser: one function per precedence level (the same
//! ladder shape the teacher's expression-only parser used for
//! `equality`/`comparison`/`term`/`factor`/`unary`/`primary`), extended to
//! the full statement grammar and to the ten-level table this language
//! actually specifies.
//!
//! Every production that builds a fresh `Expr`/`Stmt`/list immediately
//! records it with `self.tracker.push(..)`; the production that adopts it
//! as a child calls `self.tracker.pop(n)` (or `pop_and_push`) to fold the
//! children back down to one entry. See `tracker.rs` for why this parallel
//! bookkeeping exists even though the real values already flow by ordinary
//! `Result`-returning, ownership-moving Rust.

use std::io::Write;

use crate::diagnostics::{Diagnostics, SyntaxError};
use crate::lexer::{Token, TokenKind};
use crate::semantic::SemanticContext;

use super::ast::{ArithOp, Command, CmpOp, Expr, FunctionDefinition, IncrDecr, Stmt};
use super::tracker::AllocTracker;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    tracker: AllocTracker,
    semantic: SemanticContext,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            tracker: AllocTracker::new(),
            semantic: SemanticContext::new(),
        }
    }

    pub fn is_at_end_of_input(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Parses and returns the next `Command`, or `None` if input is
    /// exhausted or the command failed (a diagnostic has already been
    /// reported and the parser resynchronized in the latter case). Resets
    /// the semantic context for every call, satisfying the invariant that
    /// it starts fresh at each command boundary.
    pub fn next_command<W: Write>(&mut self, diagnostics: &mut Diagnostics<W>) -> Option<Command> {
        self.semantic.reset();
        self.skip_newlines();
        if self.check(TokenKind::Eof) {
            return None;
        }

        let outcome = if self.check(TokenKind::Define) {
            self.parse_function_definition()
        } else {
            self.parse_statement_list_command()
        };

        let command = match outcome {
            Ok(command) => command,
            Err(err) => {
                diagnostics.report(err);
                self.tracker.release_all();
                self.synchronize();
                self.semantic.reset();
                return None;
            }
        };

        if self.semantic.has_failed() {
            if let Some(err) = self.semantic.take_error() {
                diagnostics.report(err);
            }
            self.tracker.release_all();
            self.semantic.reset();
            return None;
        }

        // The top-level fragment has already been returned by value; this
        // just discards the tracker's parallel bookkeeping copy.
        self.tracker.release_all();
        Some(command)
    }

    fn parse_function_definition(&mut self) -> Result<Command, SyntaxError> {
        self.advance(); // 'define'
        let name_tok = self.consume(TokenKind::Ident, "expected function name")?;
        let name = name_tok.lexeme.clone();

        self.consume(TokenKind::LParen, "expected '(' after function name")?;
        self.semantic.enter_function();

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let p = self.consume(TokenKind::Ident, "expected parameter name")?;
                self.tracker.note_string(p.lexeme.clone());
                self.semantic.check_and_add_name(&p.lexeme, p.line, p.column);
                self.tracker.consume_string(&p.lexeme);
                params.push(p.lexeme);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected ')' after parameters")?;
        self.tracker.push(params.clone());

        let mut autos = Vec::new();
        if self.check(TokenKind::Auto) {
            self.advance();
            loop {
                let a = self.consume(TokenKind::Ident, "expected auto variable name")?;
                self.tracker.note_string(a.lexeme.clone());
                self.semantic.check_and_add_name(&a.lexeme, a.line, a.column);
                self.tracker.consume_string(&a.lexeme);
                autos.push(a.lexeme);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.tracker.push(autos.clone());

        self.skip_newlines();
        let body_stmt = self.parse_block()?; // pushes its own Block entry
        self.semantic.leave_function();

        let body = match body_stmt {
            Stmt::Block(ss) => ss,
            _ => unreachable!("parse_block always returns Stmt::Block"),
        };

        let def = FunctionDefinition {
            name,
            params,
            autos,
            body,
        };
        self.tracker.pop_and_push(3, def.clone());
        Ok(Command::FunctionDefinition(def))
    }

    fn parse_statement_list_command(&mut self) -> Result<Command, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            let s = self.parse_statement()?; // pushes 1 entry
            stmts.push(s);
            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
                        if self.check(TokenKind::Newline) {
                            self.advance();
                        }
                        break;
                    }
                }
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                _ => return Err(self.error_here("expected ';' or newline")),
            }
        }
        let n = stmts.len();
        self.tracker.pop_and_push(n, stmts.clone());
        Ok(Command::Statements(stmts))
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break => {
                let t = self.advance();
                self.semantic.check_break(t.line, t.column);
                let node = Stmt::Break;
                self.tracker.push(node.clone());
                Ok(node)
            }
            TokenKind::Continue => {
                let t = self.advance();
                self.semantic.check_continue(t.line, t.column);
                let node = Stmt::Continue;
                self.tracker.push(node.clone());
                Ok(node)
            }
            TokenKind::Halt => {
                self.advance();
                let node = Stmt::Halt;
                self.tracker.push(node.clone());
                Ok(node)
            }
            TokenKind::Return => {
                let kw = self.advance();
                self.semantic.check_return(kw.line, kw.column);
                let has_value = !matches!(
                    self.peek().kind,
                    TokenKind::Semicolon | TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace
                );
                let node = if has_value {
                    let e = self.parse_expr()?; // pushes 1
                    let node = Stmt::Return(Some(e));
                    self.tracker.pop_and_push(1, node.clone());
                    node
                } else {
                    let node = Stmt::Return(None);
                    self.tracker.push(node.clone());
                    node
                };
                Ok(node)
            }
            _ => {
                let e = self.parse_expr()?; // pushes 1
                let node = Stmt::ExprStmt(e);
                self.tracker.pop_and_push(1, node.clone());
                Ok(node)
            }
        }
    }

    fn parse_block(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LBrace, "expected '{'")?;
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.error_here("unterminated block, expected '}'"));
            }
            let s = self.parse_statement()?;
            stmts.push(s);
            while matches!(self.peek().kind, TokenKind::Semicolon | TokenKind::Newline) {
                self.advance();
            }
        }
        self.consume(TokenKind::RBrace, "expected '}'")?;
        let n = stmts.len();
        let node = Stmt::Block(stmts);
        self.tracker.pop_and_push(n, node.clone());
        Ok(node)
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // 'if'
        self.consume(TokenKind::LParen, "expected '(' after 'if'")?;
        let cond = self.parse_expr()?; // pushes 1
        self.consume(TokenKind::RParen, "expected ')' after condition")?;
        self.skip_newlines();
        let then_branch = self.parse_statement()?; // pushes 1
        let mut adopted = 2;

        let save = self.current;
        self.skip_newlines();
        let else_branch = if self.check(TokenKind::Else) {
            self.advance();
            self.skip_newlines();
            let s = self.parse_statement()?; // pushes 1
            adopted += 1;
            Some(Box::new(s))
        } else {
            self.current = save;
            None
        };

        let node = Stmt::If(cond, Box::new(then_branch), else_branch);
        self.tracker.pop_and_push(adopted, node.clone());
        Ok(node)
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance(); // 'while'
        self.consume(TokenKind::LParen, "expected '(' after 'while'")?;
        let cond = self.parse_expr()?; // pushes 1
        self.consume(TokenKind::RParen, "expected ')' after condition")?;
        self.skip_newlines();
        self.semantic.enter_loop();
        let body = self.parse_statement()?; // pushes 1
        self.semantic.leave_loop();
        let node = Stmt::While(cond, Box::new(body));
        self.tracker.pop_and_push(2, node.clone());
        Ok(node)
    }

    // ---- expression grammar, precedence low (1) to high (10) ----

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            let node = Expr::Cmp(Box::new(left), Box::new(right), CmpOp::Or);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_not()?;
            let node = Expr::Cmp(Box::new(left), Box::new(right), CmpOp::And);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(TokenKind::Bang) {
            self.advance();
            let operand = self.parse_not()?;
            let node = Expr::Not(Box::new(operand));
            self.tracker.pop_and_push(1, node.clone());
            Ok(node)
        } else {
            self.parse_comparison()
        }
    }

    /// Comparisons are left-associative per the grammar table, which is why
    /// `a < b < c` parses as `(a < b) < c` rather than failing or chaining —
    /// preserved intentionally, not a bug. See `DESIGN.md`.
    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_assignment()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::Ne => CmpOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_assignment()?;
            let node = Expr::Cmp(Box::new(left), Box::new(right), op);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    /// Assignment binds tighter than comparison but is right-associative, so
    /// `a = b = 3` assigns `3` to `b` then `b`'s value to `a`. Compound
    /// assignment desugars `x op= e` to `x = x op e`.
    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_additive()?; // pushes 1

        let (op, is_compound) = match self.peek().kind {
            TokenKind::Assign => (None, false),
            TokenKind::PlusEq => (Some(ArithOp::Plus), true),
            TokenKind::MinusEq => (Some(ArithOp::Minus), true),
            TokenKind::StarEq => (Some(ArithOp::Mul), true),
            TokenKind::SlashEq => (Some(ArithOp::Div), true),
            TokenKind::PercentEq => (Some(ArithOp::Mod), true),
            TokenKind::CaretEq => (Some(ArithOp::Pow), true),
            _ => return Ok(left),
        };

        let op_tok = self.peek().clone();
        let name = match &left {
            Expr::Var(n) => n.clone(),
            _ => return Err(self.error_at(&op_tok, "invalid assignment target")),
        };
        self.advance(); // consume the assignment operator
        let rhs = self.parse_assignment()?; // pushes 1, right-associative

        let node = if is_compound {
            let var_read = Expr::Var(name.clone());
            self.tracker.push(var_read.clone());
            let combined = Expr::Arith(Box::new(var_read), Box::new(rhs), op.unwrap());
            self.tracker.pop_and_push(2, combined.clone()); // var_read + rhs -> combined
            Expr::Assign(name, Box::new(combined))
        } else {
            Expr::Assign(name, Box::new(rhs))
        };
        self.tracker.pop_and_push(2, node.clone()); // left + (combined or rhs) -> node
        Ok(node)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ArithOp::Plus,
                TokenKind::Minus => ArithOp::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let node = Expr::Arith(Box::new(left), Box::new(right), op);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            let node = Expr::Arith(Box::new(left), Box::new(right), op);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary_neg()?;
        while self.check(TokenKind::Caret) {
            self.advance();
            let right = self.parse_unary_neg()?;
            let node = Expr::Arith(Box::new(left), Box::new(right), ArithOp::Pow);
            self.tracker.pop_and_push(2, node.clone());
            left = node;
        }
        Ok(left)
    }

    fn parse_unary_neg(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(TokenKind::Minus) {
            self.advance();
            let operand = self.parse_unary_neg()?;
            let node = Expr::Neg(Box::new(operand));
            self.tracker.pop_and_push(1, node.clone());
            Ok(node)
        } else {
            self.parse_incr_decr()
        }
    }

    fn parse_incr_decr(&mut self) -> Result<Expr, SyntaxError> {
        if matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op_tok = self.advance();
            let op = if op_tok.kind == TokenKind::PlusPlus {
                IncrDecr::Incr
            } else {
                IncrDecr::Decr
            };
            let name_tok = self.consume(TokenKind::Ident, "expected variable after prefix operator")?;
            let node = Expr::PreOp(name_tok.lexeme, op);
            self.tracker.push(node.clone());
            return Ok(node);
        }

        let primary = self.parse_primary()?; // pushes 1
        if matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            if let Expr::Var(name) = &primary {
                let name = name.clone();
                let op_tok = self.advance();
                let op = if op_tok.kind == TokenKind::PlusPlus {
                    IncrDecr::Incr
                } else {
                    IncrDecr::Decr
                };
                let node = Expr::PostOp(name, op);
                self.tracker.pop_and_push(1, node.clone());
                return Ok(node);
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let value: f64 = tok
                    .lexeme
                    .parse()
                    .expect("scanner only emits well-formed number lexemes");
                let node = Expr::Const(value);
                self.tracker.push(node.clone());
                Ok(node)
            }
            TokenKind::Ident => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            let a = self.parse_expr()?; // pushes 1
                            args.push(a);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.consume(TokenKind::RParen, "expected ')' after arguments")?;
                    let n = args.len();
                    let node = Expr::Call(tok.lexeme, args);
                    self.tracker.pop_and_push(n, node.clone());
                    Ok(node)
                } else {
                    let node = Expr::Var(tok.lexeme);
                    self.tracker.push(node.clone());
                    Ok(node)
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?; // already pushed; grouping adds no node
                self.consume(TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            _ => Err(self.error_here("expected an expression")),
        }
    }

    // ---- token-stream plumbing ----

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.current].clone();
        if t.kind != TokenKind::Eof {
            self.current += 1;
        }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Discards tokens through the next newline (or end of input), the
    /// recovery discipline after any syntax error.
    fn synchronize(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        self.error_at(self.peek(), message)
    }

    fn error_at(&self, tok: &Token, message: &str) -> SyntaxError {
        SyntaxError {
            message: message.to_string(),
            lexeme: tok.lexeme.clone(),
            line: tok.line,
            column: tok.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;

    fn parse_one(src: &str) -> (Option<Command>, String) {
        let mut buf = Vec::new();
        let mut diag = Diagnostics::new(&mut buf);
        let tokens = Scanner::new(src).scan_tokens(&mut diag);
        let mut parser = Parser::new(tokens);
        let command = parser.next_command(&mut diag);
        (command, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let (cmd, errs) = parse_one("1+2*3\n");
        assert_eq!(errs, "");
        match cmd {
            Some(Command::Statements(stmts)) => {
                assert_eq!(stmts.len(), 1);
                assert_eq!(
                    stmts[0],
                    Stmt::ExprStmt(Expr::Arith(
                        Box::new(Expr::Const(1.0)),
                        Box::new(Expr::Arith(
                            Box::new(Expr::Const(2.0)),
                            Box::new(Expr::Const(3.0)),
                            ArithOp::Mul
                        )),
                        ArithOp::Plus
                    ))
                );
            }
            other => panic!("expected statements, got {other:?}"),
        }
    }

    #[test]
    fn chained_comparison_is_left_associative() {
        let (cmd, _) = parse_one("a < b < c\n");
        match cmd.unwrap() {
            Command::Statements(stmts) => {
                let Stmt::ExprStmt(Expr::Cmp(left, right, CmpOp::Lt)) = &stmts[0] else {
                    panic!("expected top-level Lt")
                };
                assert!(matches!(**right, Expr::Var(ref n) if n == "c"));
                assert!(matches!(**left, Expr::Cmp(_, _, CmpOp::Lt)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compound_assignment_desugars() {
        let (cmd, _) = parse_one("x += 1\n");
        match cmd.unwrap() {
            Command::Statements(stmts) => {
                assert_eq!(
                    stmts[0],
                    Stmt::ExprStmt(Expr::Assign(
                        "x".to_string(),
                        Box::new(Expr::Arith(
                            Box::new(Expr::Var("x".to_string())),
                            Box::new(Expr::Const(1.0)),
                            ArithOp::Plus
                        ))
                    ))
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn function_definition_with_params_and_autos() {
        let (cmd, errs) = parse_one("define f(n) auto x { x = 1; return n + x }\n");
        assert_eq!(errs, "");
        match cmd.unwrap() {
            Command::FunctionDefinition(def) => {
                assert_eq!(def.name, "f");
                assert_eq!(def.params, vec!["n".to_string()]);
                assert_eq!(def.autos, vec!["x".to_string()]);
                assert_eq!(def.body.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_parameter_name_is_a_semantic_error_not_a_crash() {
        let (cmd, errs) = parse_one("define f(x, x) { }\n");
        assert!(cmd.is_none());
        assert!(errs.contains("duplicate name in parameter or auto variable list"));
    }

    #[test]
    fn break_outside_while_is_a_semantic_error() {
        let (cmd, errs) = parse_one("break\n");
        assert!(cmd.is_none());
        assert!(errs.contains("break outside while"));
    }

    #[test]
    fn syntax_error_resynchronizes_to_next_newline() {
        let mut buf = Vec::new();
        let mut diag = Diagnostics::new(&mut buf);
        let tokens = Scanner::new(")\n1\n").scan_tokens(&mut diag);
        let mut parser = Parser::new(tokens);
        let first = parser.next_command(&mut diag);
        assert!(first.is_none());
        let second = parser.next_command(&mut diag);
        assert_eq!(
            second,
            Some(Command::Statements(vec![Stmt::ExprStmt(Expr::Const(1.0))]))
        );
    }

    #[test]
    fn if_else_across_newlines() {
        let (cmd, errs) = parse_one("if (1)\n  2\nelse\n  3\n");
        assert_eq!(errs, "");
        assert!(matches!(
            cmd,
            Some(Command::Statements(stmts)) if matches!(stmts[0], Stmt::If(_, _, Some(_)))
        ));
    }

    #[test]
    fn if_without_else_leaves_trailing_newline_for_next_command() {
        let mut buf = Vec::new();
        let mut diag = Diagnostics::new(&mut buf);
        let tokens = Scanner::new("if (1) 2\n3\n").scan_tokens(&mut diag);
        let mut parser = Parser::new(tokens);
        let first = parser.next_command(&mut diag).unwrap();
        assert!(matches!(first, Command::Statements(ref s) if matches!(s[0], Stmt::If(_, _, None))));
        let second = parser.next_command(&mut diag).unwrap();
        assert_eq!(
            second,
            Command::Statements(vec![Stmt::ExprStmt(Expr::Const(3.0))])
        );
    }
}
