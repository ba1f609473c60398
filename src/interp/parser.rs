//! Recursive-descent parser producing [`Stmt`] trees.
//!
//! The grammar follows Python's precedence ladder. Unsupported statements
//! (`class`, `with`, `yield`) are rejected here, at compile time, rather than
//! failing halfway through a call.

use super::ast::*;
use super::error::SyntaxError;
use super::lexer::{tokenize, Tok, Token};
use super::stack::ensure_sufficient_stack;
use super::value::Value;
use std::sync::Arc;

type PResult<T> = Result<T, SyntaxError>;

/// Parse a whole module.
pub fn parse_module(source: &str) -> PResult<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut body = Vec::new();
    while !parser.at(&Tok::Eof) {
        if parser.eat(&Tok::Newline) {
            continue;
        }
        body.extend(parser.statement()?);
    }
    Ok(body)
}

/// Parse a standalone expression (used for f-string fields).
pub fn parse_expression(source: &str, line: usize) -> PResult<Expr> {
    let tokens = tokenize(source)?
        .into_iter()
        .map(|t| Token { line, ..t })
        .collect();
    let mut parser = Parser::new(tokens);
    let expr = parser.testlist()?;
    parser.eat(&Tok::Newline);
    if !parser.at(&Tok::Eof) {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> &Tok {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Tok {
        match self.tokens.get(self.pos + n).or_else(|| self.tokens.last()) {
            Some(t) => &t.tok,
            None => &Tok::Eof,
        }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    /// Line to blame for an error: layout tokens belong to the statement
    /// that was being parsed, not to whatever line follows it.
    fn error_line(&self) -> usize {
        let at_layout = matches!(
            self.peek(),
            Tok::Newline | Tok::Eof | Tok::Indent | Tok::Dedent
        );
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(prev) if at_layout => prev.line,
            _ => self.line(),
        }
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Kw(k) if *k == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", op, describe(self.peek()))))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> PResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", kw, describe(self.peek()))))
        }
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.advance() {
            Tok::Name(name) => Ok(name),
            other => Err(self.error(format!("expected a name, found {}", describe(&other)))),
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.error_line())
    }

    fn unexpected(&self) -> SyntaxError {
        self.error(format!("invalid syntax near {}", describe(self.peek())))
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Op(";"))
    }

    fn starts_expression(&self) -> bool {
        match self.peek() {
            Tok::Name(_) | Tok::Int(_) | Tok::Float(_) | Tok::Str(_) | Tok::FStr(_) => true,
            Tok::Kw(kw) => matches!(*kw, "None" | "True" | "False" | "not" | "lambda" | "await"),
            Tok::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Vec<Stmt>> {
        match self.peek() {
            Tok::Indent => Err(self.error("unexpected indent")),
            Tok::Kw("def") => Ok(vec![self.function_def()?]),
            Tok::Kw("if") => Ok(vec![self.if_stmt()?]),
            Tok::Kw("while") => Ok(vec![self.while_stmt()?]),
            Tok::Kw("for") => Ok(vec![self.for_stmt()?]),
            Tok::Kw("try") => Ok(vec![self.try_stmt()?]),
            Tok::Op("@") => {
                // Decorators are accepted and ignored.
                while self.eat_op("@") {
                    self.test()?;
                    if !self.eat(&Tok::Newline) {
                        return Err(self.unexpected());
                    }
                }
                if !self.at_kw("def") {
                    return Err(self.error("decorators are only supported on functions"));
                }
                Ok(vec![self.function_def()?])
            }
            Tok::Kw(kw @ ("class" | "with" | "async" | "yield")) => {
                Err(self.error(format!("'{}' is not supported", kw)))
            }
            _ => self.simple_line(),
        }
    }

    fn simple_line(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.small_stmt()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
            stmts.push(self.small_stmt()?);
        }
        if !self.eat(&Tok::Newline) && !self.at(&Tok::Eof) {
            return Err(self.unexpected());
        }
        Ok(stmts)
    }

    fn small_stmt(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Tok::Kw("pass") => {
                self.advance();
                Ok(Stmt::Pass)
            }
            Tok::Kw("break") => {
                self.advance();
                Ok(Stmt::Break)
            }
            Tok::Kw("continue") => {
                self.advance();
                Ok(Stmt::Continue)
            }
            Tok::Kw("return") => {
                self.advance();
                if self.at_statement_end() {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.testlist()?)))
                }
            }
            Tok::Kw("raise") => {
                self.advance();
                if self.at_statement_end() {
                    return Ok(Stmt::Raise(None));
                }
                let exc = self.test()?;
                if self.eat_kw("from") {
                    self.test()?;
                }
                Ok(Stmt::Raise(Some(exc)))
            }
            Tok::Kw(kw @ ("global" | "nonlocal")) => {
                let is_global = *kw == "global";
                self.advance();
                let mut names = vec![self.expect_name()?];
                while self.eat_op(",") {
                    names.push(self.expect_name()?);
                }
                Ok(if is_global {
                    Stmt::Global(names)
                } else {
                    Stmt::Nonlocal(names)
                })
            }
            Tok::Kw("del") => {
                self.advance();
                let mut targets = vec![self.bitor()?];
                while self.eat_op(",") {
                    if self.at_statement_end() {
                        break;
                    }
                    targets.push(self.bitor()?);
                }
                for target in &targets {
                    self.check_target(target)?;
                }
                Ok(Stmt::Delete(targets))
            }
            Tok::Kw("assert") => {
                self.advance();
                let test = self.test()?;
                let msg = if self.eat_op(",") {
                    Some(self.test()?)
                } else {
                    None
                };
                Ok(Stmt::Assert(test, msg))
            }
            Tok::Kw("import") => {
                self.advance();
                let mut names = Vec::new();
                loop {
                    let module = self.dotted_name()?;
                    let alias = if self.eat_kw("as") {
                        Some(self.expect_name()?)
                    } else {
                        None
                    };
                    names.push((module, alias));
                    if !self.eat_op(",") {
                        break;
                    }
                }
                Ok(Stmt::Import(names))
            }
            Tok::Kw("from") => {
                self.advance();
                let module = self.dotted_name()?;
                self.expect_kw("import")?;
                let parens = self.eat_op("(");
                let mut names = Vec::new();
                if self.eat_op("*") {
                    names.push(("*".to_string(), None));
                } else {
                    loop {
                        let name = self.expect_name()?;
                        let alias = if self.eat_kw("as") {
                            Some(self.expect_name()?)
                        } else {
                            None
                        };
                        names.push((name, alias));
                        if !self.eat_op(",") || (parens && self.at_op(")")) {
                            break;
                        }
                    }
                }
                if parens {
                    self.expect_op(")")?;
                }
                Ok(Stmt::ImportFrom { module, names })
            }
            _ => self.expr_stmt(),
        }
    }

    fn dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn expr_stmt(&mut self) -> PResult<Stmt> {
        let first = self.testlist()?;

        if self.at_op("=") {
            let mut targets = vec![first];
            loop {
                self.expect_op("=")?;
                let next = self.testlist()?;
                if self.at_op("=") {
                    targets.push(next);
                } else {
                    for target in &targets {
                        self.check_target(target)?;
                    }
                    return Ok(Stmt::Assign {
                        targets,
                        value: next,
                    });
                }
            }
        }

        if let Tok::Op(op) = self.peek() {
            if let Some(op) = augmented_op(op) {
                self.advance();
                if !matches!(
                    first,
                    Expr::Name(_) | Expr::Subscript(..) | Expr::Attribute(..)
                ) {
                    return Err(self.error("illegal expression for augmented assignment"));
                }
                let value = self.testlist()?;
                return Ok(Stmt::AugAssign {
                    target: first,
                    op,
                    value,
                });
            }
        }

        if self.eat_op(":") {
            // Annotated assignment; the annotation itself is not evaluated.
            self.check_target(&first)?;
            self.test()?;
            if self.eat_op("=") {
                let value = self.testlist()?;
                return Ok(Stmt::Assign {
                    targets: vec![first],
                    value,
                });
            }
            return Ok(Stmt::Pass);
        }

        Ok(Stmt::Expr(first))
    }

    fn check_target(&self, target: &Expr) -> PResult<()> {
        match target {
            Expr::Name(_) | Expr::Subscript(..) | Expr::Attribute(..) => Ok(()),
            Expr::Starred(inner) => self.check_target(inner),
            Expr::Tuple(items) | Expr::List(items) => {
                items.iter().try_for_each(|item| self.check_target(item))
            }
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if !self.eat(&Tok::Newline) {
            return self.simple_line();
        }
        if !self.eat(&Tok::Indent) {
            return Err(self.error("expected an indented block"));
        }
        let mut body = Vec::new();
        while !self.eat(&Tok::Dedent) {
            if self.at(&Tok::Eof) {
                break;
            }
            if self.eat(&Tok::Newline) {
                continue;
            }
            body.extend(self.statement()?);
        }
        Ok(body)
    }

    fn function_def(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect_kw("def")?;
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let (params, vararg, kwarg) = self.parameters(")", true)?;
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.test()?;
        }
        let body = self.block()?;
        Ok(Stmt::FunctionDef(Arc::new(FunctionDef {
            name,
            params,
            vararg,
            kwarg,
            body,
            line,
        })))
    }

    #[allow(clippy::type_complexity)]
    fn parameters(
        &mut self,
        close: &str,
        annotations: bool,
    ) -> PResult<(Vec<Param>, Option<String>, Option<String>)> {
        let mut params: Vec<Param> = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;
        let mut kw_only = false;
        while !self.at_op(close) {
            if self.eat_op("**") {
                kwarg = Some(self.expect_name()?);
                if annotations && self.eat_op(":") {
                    self.test()?;
                }
            } else if self.eat_op("*") {
                if let Tok::Name(_) = self.peek() {
                    vararg = Some(self.expect_name()?);
                    if annotations && self.eat_op(":") {
                        self.test()?;
                    }
                }
                kw_only = true;
            } else if self.eat_op("/") {
                // Positional-only marker; every parameter here is positional anyway.
            } else {
                let name = self.expect_name()?;
                if annotations && self.eat_op(":") {
                    self.test()?;
                }
                let default = if self.eat_op("=") {
                    Some(self.test()?)
                } else {
                    None
                };
                if default.is_none()
                    && !kw_only
                    && params.iter().any(|p| p.default.is_some() && !p.kw_only)
                {
                    return Err(self.error("non-default argument follows default argument"));
                }
                if params.iter().any(|p| p.name == name) {
                    return Err(self.error(format!("duplicate argument '{}'", name)));
                }
                params.push(Param {
                    name,
                    default,
                    kw_only,
                });
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok((params, vararg, kwarg))
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        // Consumes either `if` or `elif`.
        self.advance();
        let test = self.test()?;
        let body = self.block()?;
        let orelse = if self.at_kw("elif") {
            vec![self.if_stmt()?]
        } else if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        self.expect_kw("while")?;
        let test = self.test()?;
        let body = self.block()?;
        let orelse = if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::While { test, body, orelse })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        self.expect_kw("for")?;
        let target = self.target_list()?;
        self.expect_kw("in")?;
        let iter = self.testlist()?;
        let body = self.block()?;
        let orelse = if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    fn try_stmt(&mut self) -> PResult<Stmt> {
        self.expect_kw("try")?;
        let body = self.block()?;
        let mut handlers = Vec::new();
        while self.eat_kw("except") {
            let (class, name) = if self.at_op(":") {
                (None, None)
            } else {
                let class = self.test()?;
                let name = if self.eat_kw("as") {
                    Some(self.expect_name()?)
                } else {
                    None
                };
                (Some(class), name)
            };
            let body = self.block()?;
            handlers.push(Handler { class, name, body });
        }
        let orelse = if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat_kw("finally") {
            self.block()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error("expected 'except' or 'finally' block"));
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    /// Loop targets stop at `bitor` so the following `in` is not read as a comparison.
    fn target_list(&mut self) -> PResult<Expr> {
        let first = self.star_or_bitor()?;
        let target = if self.at_op(",") {
            let mut items = vec![first];
            while self.eat_op(",") {
                if self.at_kw("in") {
                    break;
                }
                items.push(self.star_or_bitor()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };
        self.check_target(&target)?;
        Ok(target)
    }

    fn star_or_bitor(&mut self) -> PResult<Expr> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.bitor()?)))
        } else {
            self.bitor()
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Comma-separated expressions; more than one (or a trailing comma) makes a tuple.
    fn testlist(&mut self) -> PResult<Expr> {
        let first = self.star_or_test()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.star_or_test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn star_or_test(&mut self) -> PResult<Expr> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.bitor()?)))
        } else {
            self.test()
        }
    }

    fn test(&mut self) -> PResult<Expr> {
        ensure_sufficient_stack(|| {
            if self.at_kw("lambda") {
                return self.lambda();
            }
            let expr = self.or_test()?;
            if self.eat_kw("if") {
                let test = self.or_test()?;
                self.expect_kw("else")?;
                let orelse = self.test()?;
                return Ok(Expr::IfExp {
                    test: Box::new(test),
                    body: Box::new(expr),
                    orelse: Box::new(orelse),
                });
            }
            Ok(expr)
        })
    }

    fn lambda(&mut self) -> PResult<Expr> {
        let line = self.line();
        self.expect_kw("lambda")?;
        let (params, vararg, kwarg) = self.parameters(":", false)?;
        self.expect_op(":")?;
        let body = self.test()?;
        Ok(Expr::Lambda(Arc::new(FunctionDef {
            name: "<lambda>".to_string(),
            params,
            vararg,
            kwarg,
            body: vec![Stmt::Return(Some(body))],
            line,
        })))
    }

    fn or_test(&mut self) -> PResult<Expr> {
        let first = self.and_test()?;
        if !self.at_kw("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("or") {
            values.push(self.and_test()?);
        }
        Ok(Expr::BoolOp(BoolOp::Or, values))
    }

    fn and_test(&mut self) -> PResult<Expr> {
        let first = self.not_test()?;
        if !self.at_kw("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("and") {
            values.push(self.not_test()?);
        }
        Ok(Expr::BoolOp(BoolOp::And, values))
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.eat_kw("not") {
            let operand = self.not_test()?;
            return Ok(Expr::UnaryOp(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let left = self.bitor()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::Op("<") => CmpOp::Lt,
                Tok::Op(">") => CmpOp::Gt,
                Tok::Op("==") => CmpOp::Eq,
                Tok::Op(">=") => CmpOp::GtE,
                Tok::Op("<=") => CmpOp::LtE,
                Tok::Op("!=") => CmpOp::NotEq,
                Tok::Kw("in") => CmpOp::In,
                Tok::Kw("is") => {
                    if matches!(self.peek_nth(1), Tok::Kw("not")) {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                Tok::Kw("not") if matches!(self.peek_nth(1), Tok::Kw("in")) => {
                    self.advance();
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.advance();
            ops.push((op, self.bitor()?));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), ops))
        }
    }

    fn binary_level(
        &mut self,
        table: &[(&str, BinOp)],
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (symbol, op) in table {
                if self.eat_op(symbol) {
                    let right = next(self)?;
                    left = Expr::BinOp(Box::new(left), *op, Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn bitor(&mut self) -> PResult<Expr> {
        self.binary_level(&[("|", BinOp::BitOr)], Self::bitxor)
    }

    fn bitxor(&mut self) -> PResult<Expr> {
        self.binary_level(&[("^", BinOp::BitXor)], Self::bitand)
    }

    fn bitand(&mut self) -> PResult<Expr> {
        self.binary_level(&[("&", BinOp::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> PResult<Expr> {
        self.binary_level(&[("<<", BinOp::LShift), (">>", BinOp::RShift)], Self::arith)
    }

    fn arith(&mut self) -> PResult<Expr> {
        self.binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::term)
    }

    fn term(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                ("*", BinOp::Mul),
                ("/", BinOp::Div),
                ("//", BinOp::FloorDiv),
                ("%", BinOp::Mod),
                ("@", BinOp::MatMul),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Tok::Op("-") => UnaryOp::Neg,
            Tok::Op("+") => UnaryOp::Pos,
            Tok::Op("~") => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.advance();
        let operand = ensure_sufficient_stack(|| self.factor())?;
        Ok(Expr::UnaryOp(op, Box::new(operand)))
    }

    fn power(&mut self) -> PResult<Expr> {
        self.eat_kw("await");
        let base = self.atom_expr()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(Expr::BinOp(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.at_op("(") {
                let args = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_op("[") {
                let index = self.subscript()?;
                self.expect_op("]")?;
                expr = Expr::Subscript(Box::new(expr), Box::new(index));
            } else if self.eat_op(".") {
                let name = self.expect_name()?;
                expr = Expr::Attribute(Box::new(expr), name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> PResult<Vec<Arg>> {
        self.expect_op("(")?;
        let mut args = Vec::new();
        while !self.at_op(")") {
            if self.eat_op("**") {
                args.push(Arg::StarStar(self.test()?));
            } else if self.eat_op("*") {
                args.push(Arg::Star(self.test()?));
            } else if matches!(self.peek(), Tok::Name(_)) && matches!(self.peek_nth(1), Tok::Op("="))
            {
                let name = self.expect_name()?;
                self.expect_op("=")?;
                args.push(Arg::Kw(name, self.test()?));
            } else {
                let mut value = self.test()?;
                if self.at_kw("for") {
                    value = Expr::ListComp {
                        elt: Box::new(value),
                        generators: self.comp_for()?,
                    };
                }
                args.push(Arg::Pos(value));
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(args)
    }

    fn subscript(&mut self) -> PResult<Expr> {
        let first = self.subscript_item()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.subscript_item()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn subscript_item(&mut self) -> PResult<Expr> {
        let lower = if self.at_op(":") {
            None
        } else {
            Some(self.test()?)
        };
        if !self.eat_op(":") {
            return lower.ok_or_else(|| self.unexpected());
        }
        let bound_ends = |p: &Self| p.at_op(":") || p.at_op("]") || p.at_op(",");
        let upper = if bound_ends(self) {
            None
        } else {
            Some(self.test()?)
        };
        let step = if self.eat_op(":") {
            if self.at_op("]") || self.at_op(",") {
                None
            } else {
                Some(self.test()?)
            }
        } else {
            None
        };
        Ok(Expr::Slice(
            lower.map(Box::new),
            upper.map(Box::new),
            step.map(Box::new),
        ))
    }

    fn comp_for(&mut self) -> PResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.eat_kw("for") {
            let target = self.target_list()?;
            self.expect_kw("in")?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.eat_kw("if") {
                ifs.push(self.or_test()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn atom(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.advance() {
            Tok::Name(name) => Ok(Expr::Name(name)),
            Tok::Int(i) => Ok(Expr::Constant(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Constant(Value::Float(f))),
            Tok::Kw("None") => Ok(Expr::Constant(Value::None)),
            Tok::Kw("True") => Ok(Expr::Constant(Value::Bool(true))),
            Tok::Kw("False") => Ok(Expr::Constant(Value::Bool(false))),
            Tok::Op("...") => Ok(Expr::Constant(Value::None)),
            Tok::Str(s) => self.strings(false, s, line),
            Tok::FStr(s) => self.strings(true, s, line),
            Tok::Op("(") => self.paren(),
            Tok::Op("[") => self.list_display(),
            Tok::Op("{") => self.brace_display(),
            other => Err(self.error(format!("invalid syntax near {}", describe(&other)))),
        }
    }

    /// Adjacent literals concatenate; any f-string among them makes the whole an f-string.
    fn strings(&mut self, formatted: bool, first: String, line: usize) -> PResult<Expr> {
        let mut pieces = vec![(formatted, first)];
        loop {
            let formatted = match self.peek() {
                Tok::Str(_) => false,
                Tok::FStr(_) => true,
                _ => break,
            };
            if let Tok::Str(s) | Tok::FStr(s) = self.advance() {
                pieces.push((formatted, s));
            }
        }
        if pieces.iter().all(|(f, _)| !f) {
            let joined: String = pieces.into_iter().map(|(_, s)| s).collect();
            return Ok(Expr::Constant(Value::Str(joined)));
        }
        let mut parts = Vec::new();
        for (formatted, text) in pieces {
            if formatted {
                parts.extend(parse_fstring(&text, line)?);
            } else if !text.is_empty() {
                parts.push(FPart::Lit(text));
            }
        }
        Ok(Expr::FString(parts))
    }

    fn paren(&mut self) -> PResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.star_or_test()?;
        if self.at_kw("for") {
            let generators = self.comp_for()?;
            self.expect_op(")")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op(")") {
                break;
            }
            items.push(self.star_or_test()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple(items))
    }

    fn list_display(&mut self) -> PResult<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.star_or_test()?;
        if self.at_kw("for") {
            let generators = self.comp_for()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.star_or_test()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(items))
    }

    fn brace_display(&mut self) -> PResult<Expr> {
        if self.eat_op("}") {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first_item = if self.eat_op("**") {
            DictItem::Unpack(self.bitor()?)
        } else {
            let first = self.star_or_test()?;
            if !self.eat_op(":") {
                return self.set_display(first);
            }
            let value = self.test()?;
            if self.at_kw("for") {
                let generators = self.comp_for()?;
                self.expect_op("}")?;
                return Ok(Expr::DictComp {
                    key: Box::new(first),
                    value: Box::new(value),
                    generators,
                });
            }
            DictItem::Pair(first, value)
        };
        let mut items = vec![first_item];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            if self.eat_op("**") {
                items.push(DictItem::Unpack(self.bitor()?));
            } else {
                let key = self.test()?;
                self.expect_op(":")?;
                items.push(DictItem::Pair(key, self.test()?));
            }
        }
        self.expect_op("}")?;
        Ok(Expr::Dict(items))
    }

    fn set_display(&mut self, first: Expr) -> PResult<Expr> {
        if self.at_kw("for") {
            let generators = self.comp_for()?;
            self.expect_op("}")?;
            return Ok(Expr::SetComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            items.push(self.star_or_test()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Set(items))
    }
}

fn augmented_op(op: &str) -> Option<BinOp> {
    Some(match op {
        "+=" => BinOp::Add,
        "-=" => BinOp::Sub,
        "*=" => BinOp::Mul,
        "/=" => BinOp::Div,
        "//=" => BinOp::FloorDiv,
        "%=" => BinOp::Mod,
        "**=" => BinOp::Pow,
        "&=" => BinOp::BitAnd,
        "|=" => BinOp::BitOr,
        "^=" => BinOp::BitXor,
        "<<=" => BinOp::LShift,
        ">>=" => BinOp::RShift,
        "@=" => BinOp::MatMul,
        _ => return None,
    })
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(n) => format!("'{}'", n),
        Tok::Kw(k) => format!("'{}'", k),
        Tok::Int(i) => format!("'{}'", i),
        Tok::Float(f) => format!("'{}'", f),
        Tok::Str(_) | Tok::FStr(_) => "string literal".to_string(),
        Tok::Op(op) => format!("'{}'", op),
        Tok::Newline => "end of line".to_string(),
        Tok::Indent => "indent".to_string(),
        Tok::Dedent => "dedent".to_string(),
        Tok::Eof => "end of input".to_string(),
    }
}

/// Split an f-string body into literal text and `{expr!conv:spec}` fields.
fn parse_fstring(text: &str, line: usize) -> PResult<Vec<FPart>> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '}' {
            if chars.get(i + 1) == Some(&'}') {
                literal.push('}');
                i += 2;
                continue;
            }
            return Err(SyntaxError::new("f-string: single '}' is not allowed", line));
        }
        if c != '{' {
            literal.push(c);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'{') {
            literal.push('{');
            i += 2;
            continue;
        }

        let mut depth = 0i32;
        let mut quote: Option<char> = None;
        let mut conversion_at = None;
        let mut spec_at = None;
        let mut j = i + 1;
        while j < chars.len() {
            let d = chars[j];
            if let Some(q) = quote {
                if d == q {
                    quote = None;
                }
                j += 1;
                continue;
            }
            match d {
                '\'' | '"' if spec_at.is_none() => quote = Some(d),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth -= 1,
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                '!' if depth == 0
                    && spec_at.is_none()
                    && conversion_at.is_none()
                    && chars.get(j + 1) != Some(&'=') =>
                {
                    conversion_at = Some(j)
                }
                ':' if depth == 0 && spec_at.is_none() => spec_at = Some(j),
                _ => {}
            }
            j += 1;
        }
        if j >= chars.len() {
            return Err(SyntaxError::new("f-string: expecting '}'", line));
        }

        let expr_end = conversion_at.or(spec_at).unwrap_or(j);
        let expr_text: String = chars[i + 1..expr_end].iter().collect();
        let expr_text = expr_text.trim().trim_end_matches('=').trim();
        if expr_text.is_empty() {
            return Err(SyntaxError::new("f-string: empty expression not allowed", line));
        }
        let conversion = conversion_at.and_then(|k| chars.get(k + 1).copied());
        let spec = spec_at.map(|k| chars[k + 1..j].iter().collect::<String>());
        if !literal.is_empty() {
            parts.push(FPart::Lit(std::mem::take(&mut literal)));
        }
        parts.push(FPart::Expr {
            expr: parse_expression(expr_text, line)?,
            conversion,
            spec,
        });
        i = j + 1;
    }
    if !literal.is_empty() {
        parts.push(FPart::Lit(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_with_defaults_and_annotations() {
        let module = parse_module("def f(a: int, b: list[int] = None, *rest, **opts) -> int:\n    return a\n").unwrap();
        let Stmt::FunctionDef(def) = &module[0] else {
            panic!("expected a function definition");
        };
        assert_eq!(def.name, "f");
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
        assert_eq!(def.vararg.as_deref(), Some("rest"));
        assert_eq!(def.kwarg.as_deref(), Some("opts"));
    }

    #[test]
    fn test_parse_control_flow() {
        let src = "\
def classify(n):
    if n < 0:
        return 'neg'
    elif n == 0:
        return 'zero'
    else:
        for i in range(3):
            if i == n: break
        while False:
            pass
        try:
            x = 1 // n
        except (ZeroDivisionError, ValueError) as e:
            raise
        finally:
            pass
        return 'pos'
";
        let module = parse_module(src).unwrap();
        assert_eq!(module.len(), 1);
    }

    #[test]
    fn test_parse_expressions() {
        for src in [
            "x = [i * 2 for i in range(10) if i % 2 == 0]",
            "y = {k: v for k, v in d.items()}",
            "z = s[::-1]",
            "w = a if b else c",
            "v = lambda x, y=2: x + y",
            "u = not a in b",
            "t = a is not None and b not in c",
            "s = f'{name!r:>10} and {{braces}} {x + 1:.2f}'",
            "r = sum(x for x in xs)",
            "q = -2 ** 2",
            "a, *b = [1, 2, 3]",
            "p = {**d, 'k': 1}",
        ] {
            parse_module(src).unwrap_or_else(|e| panic!("{}: {}", src, e));
        }
    }

    #[test]
    fn test_syntax_errors_carry_lines() {
        let err = parse_module("def f(x):\n    return x +\n").unwrap_err();
        assert_eq!(err.line, 2);
        let err = parse_module("def f(x)\n    return x\n").unwrap_err();
        assert_eq!(err.line, 1);
        let err = parse_module("a = 1\nb = (2,\n").unwrap_err();
        assert_eq!(err.line, 2);
        let err = parse_module("x = 1\ny = [1,\n     2 +\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(parse_module("class A:\n    pass\n").is_err());
        assert!(parse_module("def f(a=1, b):\n    pass\n").is_err());
        assert!(parse_module("1 = x\n").is_err());
    }

    #[test]
    fn test_fstring_parts() {
        let parts = parse_fstring("a{x}b{y:>3}", 1).unwrap();
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[3], FPart::Expr { spec: Some(s), .. } if s == ">3"));
    }
}
