use std::mem;
use std::rc::Rc;

use log::debug;
use lox_common::error::{Error, ErrorS, SyntaxError};

use crate::ast::{
    Expr, ExprAssign, ExprCall, ExprGet, ExprInfix, ExprLiteral, ExprPrefix, ExprS, ExprSet,
    ExprSuper, ExprUpdate, ExprVar, OpInfix, OpPrefix, OpUpdate, Program, Span, Spanned, Stmt,
    StmtBlock, StmtClass, StmtExpr, StmtFor, StmtFun, StmtIf, StmtPrint, StmtReturn, StmtS,
    StmtVar, StmtWhile,
};
use crate::lexer::Token;

type Result<T, E = ErrorS> = std::result::Result<T, E>;

const MAX_ARGS: usize = 255;

/// Recursive-descent parser over an already lexed token stream.
///
/// Errors do not stop the parse: each one is recorded, the parser skips to
/// the next statement boundary and carries on, so a single run reports
/// every independent syntax error.
pub struct Parser {
    tokens: Vec<(usize, Token, usize)>,
    current: usize,
    eof: usize,
    errors: Vec<ErrorS>,
}

impl Parser {
    /// `eof` is the position reported for errors at the end of input.
    pub fn new(tokens: Vec<(usize, Token, usize)>, eof: usize) -> Self {
        Self { tokens, current: 0, eof, errors: Vec::new() }
    }

    pub fn parse(mut self) -> Result<Program, Vec<ErrorS>> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        debug!("parsed {} statement(s) with {} error(s)", stmts.len(), self.errors.len());
        if self.errors.is_empty() {
            Ok(Program { stmts })
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) -> Option<StmtS> {
        let result = match self.peek() {
            Some(Token::Class) => self.class_decl(),
            Some(Token::Fun) if matches!(self.peek_next(), Some(Token::Identifier(_))) => {
                self.fun_decl()
            }
            Some(Token::Var) => self.var_decl(),
            _ => self.statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_decl(&mut self) -> Result<StmtS> {
        let start = self.advance_start();
        let (name, _) = self.consume_identifier("class name")?;

        let super_ = if self.advance_if(&Token::Less) {
            let (name, span) = self.consume_identifier("superclass name")?;
            Some((Expr::Var(ExprVar { name }), span))
        } else {
            None
        };

        self.consume(&Token::LtBrace)?;
        let mut methods = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            let method_start = self.start();
            let (name, _) = self.consume_identifier("method name")?;
            let method = self.fun_rest(name)?;
            methods.push((method, method_start..self.prev_end()));
        }
        self.consume(&Token::RtBrace)?;

        let class = StmtClass { name, super_, methods };
        Ok((Stmt::Class(Box::new(class)), start..self.prev_end()))
    }

    fn fun_decl(&mut self) -> Result<StmtS> {
        let start = self.advance_start();
        let (name, _) = self.consume_identifier("function name")?;
        let fun = self.fun_rest(name)?;
        Ok((Stmt::Fun(fun), start..self.prev_end()))
    }

    /// Parameters and body of a function whose name has been consumed.
    fn fun_rest(&mut self, name: String) -> Result<Rc<StmtFun>> {
        self.consume(&Token::LtParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RtParen) {
            loop {
                let (param, span) = self.consume_identifier("parameter name")?;
                if params.len() >= MAX_ARGS {
                    self.errors.push((Error::SyntaxError(SyntaxError::TooManyParameters), span.clone()));
                }
                params.push((param, span));
                if !self.advance_if(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RtParen)?;
        self.consume(&Token::LtBrace)?;
        let body = self.block_rest()?;
        Ok(Rc::new(StmtFun { name, params, body }))
    }

    fn var_decl(&mut self) -> Result<StmtS> {
        let start = self.advance_start();
        let (name, _) = self.consume_identifier("variable name")?;
        let value = if self.advance_if(&Token::Equal) { Some(self.expression()?) } else { None };
        self.consume(&Token::Semicolon)?;
        Ok((Stmt::Var(StmtVar { name, value }), start..self.prev_end()))
    }

    fn statement(&mut self) -> Result<StmtS> {
        match self.peek() {
            Some(Token::For) => self.for_stmt(),
            Some(Token::If) => self.if_stmt(),
            Some(Token::LtBrace) => {
                let start = self.advance_start();
                let block = self.block_rest()?;
                Ok((Stmt::Block(block), start..self.prev_end()))
            }
            Some(Token::Print) => {
                let start = self.advance_start();
                let value = self.expression()?;
                self.consume(&Token::Semicolon)?;
                Ok((Stmt::Print(StmtPrint { value }), start..self.prev_end()))
            }
            Some(Token::Return) => {
                let start = self.advance_start();
                let value =
                    if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
                self.consume(&Token::Semicolon)?;
                Ok((Stmt::Return(StmtReturn { value }), start..self.prev_end()))
            }
            Some(Token::While) => {
                let start = self.advance_start();
                self.consume(&Token::LtParen)?;
                let cond = self.expression()?;
                self.consume(&Token::RtParen)?;
                let body = self.statement()?;
                let while_ = StmtWhile { cond, body };
                Ok((Stmt::While(Box::new(while_)), start..self.prev_end()))
            }
            _ => {
                let start = self.start();
                let value = self.expression()?;
                self.consume(&Token::Semicolon)?;
                Ok((Stmt::Expr(StmtExpr { value }), start..self.prev_end()))
            }
        }
    }

    fn for_stmt(&mut self) -> Result<StmtS> {
        let start = self.advance_start();
        self.consume(&Token::LtParen)?;
        let init = match self.peek() {
            Some(Token::Semicolon) => {
                self.advance();
                None
            }
            Some(Token::Var) => Some(self.var_decl()?),
            _ => {
                let init_start = self.start();
                let value = self.expression()?;
                self.consume(&Token::Semicolon)?;
                Some((Stmt::Expr(StmtExpr { value }), init_start..self.prev_end()))
            }
        };
        let cond = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(&Token::Semicolon)?;
        let incr = if self.check(&Token::RtParen) { None } else { Some(self.expression()?) };
        self.consume(&Token::RtParen)?;
        let body = self.statement()?;
        let for_ = StmtFor { init, cond, incr, body };
        Ok((Stmt::For(Box::new(for_)), start..self.prev_end()))
    }

    fn if_stmt(&mut self) -> Result<StmtS> {
        let start = self.advance_start();
        self.consume(&Token::LtParen)?;
        let cond = self.expression()?;
        self.consume(&Token::RtParen)?;
        let then = self.statement()?;
        let else_ = if self.advance_if(&Token::Else) { Some(self.statement()?) } else { None };
        let if_ = StmtIf { cond, then, else_ };
        Ok((Stmt::If(Box::new(if_)), start..self.prev_end()))
    }

    /// Declarations up to the closing brace; the opening brace has been
    /// consumed.
    fn block_rest(&mut self) -> Result<StmtBlock> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.consume(&Token::RtBrace)?;
        Ok(StmtBlock { stmts })
    }

    fn expression(&mut self) -> Result<ExprS> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprS> {
        let target = self.logic_or()?;
        if !self.check(&Token::Equal) {
            return Ok(target);
        }
        let equals = self.advance_span();
        let value = self.assignment()?;
        let span = target.1.start..value.1.end;
        match target.0 {
            Expr::Var(var) => {
                let assign = ExprAssign { name: var.name, value };
                Ok((Expr::Assign(Box::new(assign)), span))
            }
            Expr::Get(get) => {
                let ExprGet { object, name } = *get;
                let set = ExprSet { object, name, value };
                Ok((Expr::Set(Box::new(set)), span))
            }
            expr => {
                // Reported without unwinding; the parser is not confused.
                self.errors.push((Error::SyntaxError(SyntaxError::InvalidAssignmentTarget), equals));
                Ok((expr, target.1))
            }
        }
    }

    fn logic_or(&mut self) -> Result<ExprS> {
        self.infix(&[(Token::Or, OpInfix::LogicOr)], Self::logic_and)
    }

    fn logic_and(&mut self) -> Result<ExprS> {
        self.infix(&[(Token::And, OpInfix::LogicAnd)], Self::equality)
    }

    fn equality(&mut self) -> Result<ExprS> {
        self.infix(
            &[(Token::EqualEqual, OpInfix::Equal), (Token::BangEqual, OpInfix::NotEqual)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<ExprS> {
        self.infix(
            &[
                (Token::Greater, OpInfix::Greater),
                (Token::GreaterEqual, OpInfix::GreaterEqual),
                (Token::Less, OpInfix::Less),
                (Token::LessEqual, OpInfix::LessEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<ExprS> {
        self.infix(&[(Token::Plus, OpInfix::Add), (Token::Minus, OpInfix::Subtract)], Self::factor)
    }

    fn factor(&mut self) -> Result<ExprS> {
        self.infix(
            &[(Token::Asterisk, OpInfix::Multiply), (Token::Slash, OpInfix::Divide)],
            Self::unary,
        )
    }

    /// Left-associative chain of `ops` over operands parsed by `operand`.
    fn infix(
        &mut self,
        ops: &[(Token, OpInfix)],
        operand: fn(&mut Self) -> Result<ExprS>,
    ) -> Result<ExprS> {
        let mut lt = operand(self)?;
        while let Some(op) =
            ops.iter().find(|(token, _)| self.check(token)).map(|&(_, op)| op)
        {
            self.advance();
            let rt = operand(self)?;
            let span = lt.1.start..rt.1.end;
            lt = (Expr::Infix(Box::new(ExprInfix { lt, op, rt })), span);
        }
        Ok(lt)
    }

    fn unary(&mut self) -> Result<ExprS> {
        let op = match self.peek() {
            Some(Token::Bang) => OpPrefix::Not,
            Some(Token::Minus) => OpPrefix::Negate,
            Some(Token::PlusPlus | Token::MinusMinus) => return self.prefix_update(),
            _ => return self.call(),
        };
        let start = self.advance_start();
        let rt = self.unary()?;
        let span = start..rt.1.end;
        Ok((Expr::Prefix(Box::new(ExprPrefix { op, rt })), span))
    }

    fn prefix_update(&mut self) -> Result<ExprS> {
        let (start, token, _) = self.advance();
        let op = if token == Token::PlusPlus { OpUpdate::Increment } else { OpUpdate::Decrement };
        let (name, span) = self.consume_identifier("variable name")?;
        Ok((Expr::Update(ExprUpdate { name, op, prefix: true }), start..span.end))
    }

    fn call(&mut self) -> Result<ExprS> {
        let mut expr = self.primary()?;
        loop {
            if self.advance_if(&Token::LtParen) {
                let mut args = Vec::new();
                if !self.check(&Token::RtParen) {
                    loop {
                        let arg = self.expression()?;
                        if args.len() >= MAX_ARGS {
                            self.errors
                                .push((Error::SyntaxError(SyntaxError::TooManyArguments), arg.1.clone()));
                        }
                        args.push(arg);
                        if !self.advance_if(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&Token::RtParen)?;
                let span = expr.1.start..self.prev_end();
                expr = (Expr::Call(Box::new(ExprCall { callee: expr, args })), span);
            } else if self.advance_if(&Token::Dot) {
                let (name, name_span) = self.consume_identifier("property name")?;
                let span = expr.1.start..name_span.end;
                expr = (Expr::Get(Box::new(ExprGet { object: expr, name })), span);
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<ExprS> {
        let literal = match self.peek() {
            Some(Token::False) => Some(ExprLiteral::Bool(false)),
            Some(Token::True) => Some(ExprLiteral::Bool(true)),
            Some(Token::Nil) => Some(ExprLiteral::Nil),
            Some(Token::Number(number)) => Some(ExprLiteral::Number(*number)),
            Some(Token::String(string)) => Some(ExprLiteral::String(string.clone())),
            _ => None,
        };
        if let Some(literal) = literal {
            let span = self.advance_span();
            return Ok((Expr::Literal(literal), span));
        }

        match self.peek() {
            Some(Token::Identifier(_)) => {
                let (name, span) = self.consume_identifier("expression")?;
                let op = match self.peek() {
                    Some(Token::PlusPlus) => OpUpdate::Increment,
                    Some(Token::MinusMinus) => OpUpdate::Decrement,
                    _ => return Ok((Expr::Var(ExprVar { name }), span)),
                };
                let op_span = self.advance_span();
                Ok((Expr::Update(ExprUpdate { name, op, prefix: false }), span.start..op_span.end))
            }
            Some(Token::This) => {
                let span = self.advance_span();
                Ok((Expr::This, span))
            }
            Some(Token::Super) => {
                let start = self.advance_start();
                self.consume(&Token::Dot)?;
                let (name, span) = self.consume_identifier("superclass method name")?;
                Ok((Expr::Super(ExprSuper { name }), start..span.end))
            }
            Some(Token::LtParen) => {
                let start = self.advance_start();
                let expr = self.expression()?;
                self.consume(&Token::RtParen)?;
                Ok((Expr::Grouping(Box::new(expr)), start..self.prev_end()))
            }
            Some(Token::Fun) => {
                let start = self.advance_start();
                let fun = self.fun_rest("anonymous".to_string())?;
                Ok((Expr::Fun(fun), start..self.prev_end()))
            }
            _ => Err(self.unexpected(&["expression"])),
        }
    }

    fn synchronize(&mut self) {
        if !self.is_at_end() {
            self.advance();
        }
        while !self.is_at_end() {
            if self.previous() == Some(&Token::Semicolon) {
                return;
            }
            match self.peek() {
                Some(
                    Token::Class
                    | Token::Fun
                    | Token::Var
                    | Token::For
                    | Token::If
                    | Token::While
                    | Token::Print
                    | Token::Return,
                ) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|(_, token, _)| token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1).map(|(_, token, _)| token)
    }

    fn previous(&self) -> Option<&Token> {
        self.current.checked_sub(1).and_then(|idx| self.tokens.get(idx)).map(|(_, token, _)| token)
    }

    /// Compares token kinds, ignoring any payload.
    fn check(&self, token: &Token) -> bool {
        self.peek().map_or(false, |peek| mem::discriminant(peek) == mem::discriminant(token))
    }

    fn advance(&mut self) -> (usize, Token, usize) {
        let token = self.tokens[self.current].clone();
        self.current += 1;
        token
    }

    fn advance_if(&mut self, token: &Token) -> bool {
        let matched = self.check(token);
        if matched {
            self.advance();
        }
        matched
    }

    fn advance_span(&mut self) -> Span {
        let (start, _, end) = self.advance();
        start..end
    }

    fn advance_start(&mut self) -> usize {
        self.advance().0
    }

    fn start(&self) -> usize {
        self.tokens.get(self.current).map_or(self.eof, |&(start, _, _)| start)
    }

    fn prev_end(&self) -> usize {
        self.current
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map_or(self.eof, |&(_, _, end)| end)
    }

    fn consume(&mut self, token: &Token) -> Result<Span> {
        if self.check(token) {
            Ok(self.advance_span())
        } else {
            Err(self.unexpected(&[&format!("{:?}", token.to_string())]))
        }
    }

    fn consume_identifier(&mut self, what: &str) -> Result<Spanned<String>> {
        match self.peek() {
            Some(Token::Identifier(_)) => match self.advance() {
                (start, Token::Identifier(name), end) => Ok((name, start..end)),
                _ => unreachable!("peeked token was an identifier"),
            },
            _ => Err(self.unexpected(&[what])),
        }
    }

    fn unexpected(&self, expected: &[&str]) -> ErrorS {
        let expected = expected.iter().map(|e| e.to_string()).collect();
        match self.tokens.get(self.current) {
            Some((start, token, end)) => (
                Error::SyntaxError(SyntaxError::UnrecognizedToken {
                    token: token.to_string(),
                    expected,
                }),
                *start..*end,
            ),
            None => {
                (Error::SyntaxError(SyntaxError::UnrecognizedEOF { expected }), self.eof..self.eof)
            }
        }
    }
}
