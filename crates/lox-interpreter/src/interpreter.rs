use std::io::Write;
use std::mem;

use log::debug;
use lox_common::error::{AttributeError, Error, ErrorS, IoError, RecursionError, Result, TypeError};
use lox_common::types::Span;
use lox_syntax::ast::{
    Expr, ExprLiteral, ExprS, OpInfix, OpPrefix, OpUpdate, Program, Stmt, StmtFor, StmtS,
};
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::object::{Callable, Class, Function, Native, Object};
use crate::resolver::Resolver;

/// Scope distance of every resolved local reference, keyed by the span of
/// the referencing expression.
pub type Locals = FxHashMap<Span, usize>;

/// Deepest chain of nested calls a program may make.
pub const MAX_CALL_DEPTH: usize = 4096;

/// Below this much remaining native stack, a call moves onto a new segment.
const RED_ZONE: usize = 256 * 1024;
/// Size of each new stack segment.
const STACK_PER_SEGMENT: usize = 2 * 1024 * 1024;

/// How a statement finished. `Return` unwinds to the nearest function call.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Normal,
    Return(Object),
}

pub struct Interpreter<W> {
    globals: Env,
    env: Env,
    locals: Locals,
    stdout: W,
    source: String,
    depth: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(stdout: W) -> Self {
        let globals = Env::default();
        for native in Native::ALL {
            globals.define(native.name(), native.clone().into());
        }
        Self {
            env: globals.clone(),
            globals,
            locals: Locals::default(),
            stdout,
            source: String::new(),
            depth: 0,
        }
    }

    pub fn stdout(&self) -> &W {
        &self.stdout
    }

    /// Every source passed to [`Interpreter::run`] so far. Error spans index
    /// into this string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parses, resolves and interprets `source`. Definitions persist across
    /// calls.
    pub fn run(&mut self, source: &str) -> Result<(), Vec<ErrorS>> {
        let offset = self.source.len();
        self.source.push_str(source);
        self.source.push('\n');

        let program = lox_syntax::parse(source, offset)?;
        self.resolve(&program)?;
        self.interpret(&program).map_err(|e| vec![e])
    }

    fn resolve(&mut self, program: &Program) -> Result<(), Vec<ErrorS>> {
        let globals = self.globals.names();
        let locals = Resolver::with_globals(globals.iter().map(String::as_str)).resolve(program)?;
        debug!("resolved {} local reference(s)", locals.len());
        self.locals.extend(locals);
        Ok(())
    }

    /// Runs `program`, stopping at the first runtime error. `program` must
    /// have gone through [`Interpreter::resolve`] first.
    fn interpret(&mut self, program: &Program) -> Result<()> {
        debug!("interpreting {} statement(s)", program.stmts.len());
        for stmt_s in &program.stmts {
            if let Flow::Return(_) = self.execute(stmt_s)? {
                unreachable!("return escaped the top level");
            }
        }
        Ok(())
    }

    /// Executes `stmts` with `env` as the current scope. The previous scope
    /// is restored however the block exits.
    pub(crate) fn execute_block(&mut self, stmts: &[StmtS], env: Env) -> Result<Flow> {
        let previous = mem::replace(&mut self.env, env);
        let result = self.execute_all(stmts);
        self.env = previous;
        result
    }

    /// Runs a function body one call deeper. Fails once the chain of calls
    /// reaches [`MAX_CALL_DEPTH`].
    pub(crate) fn execute_call(&mut self, stmts: &[StmtS], env: Env, span: &Span) -> Result<Flow> {
        if self.depth >= MAX_CALL_DEPTH {
            let error = RecursionError::MaxDepthExceeded { max_depth: MAX_CALL_DEPTH };
            return Err((Error::RecursionError(error), span.clone()));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_PER_SEGMENT, || self.execute_block(stmts, env));
        self.depth -= 1;
        result
    }

    fn execute_all(&mut self, stmts: &[StmtS]) -> Result<Flow> {
        for stmt_s in stmts {
            match self.execute(stmt_s)? {
                Flow::Normal => (),
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt_s: &StmtS) -> Result<Flow> {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                let env = Env::with_parent(&self.env);
                self.execute_block(&block.stmts, env)
            }
            Stmt::Class(class) => {
                self.env.define(&class.name, Object::Nil);
                let super_ = match &class.super_ {
                    Some(super_) => match self.evaluate(super_)? {
                        Object::Class(ref super_) => Some(super_.clone()),
                        object => {
                            return Err((
                                Error::TypeError(TypeError::SuperclassInvalidType { type_: object.type_() }),
                                super_.1.clone(),
                            ));
                        }
                    },
                    None => None,
                };
                let object = Class::new(class, super_, &self.env).into();
                self.env.assign(&class.name, object, span)?;
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.evaluate(&expr.value)?;
                Ok(Flow::Normal)
            }
            Stmt::For(for_) => {
                let env = Env::with_parent(&self.env);
                let previous = mem::replace(&mut self.env, env);
                let result = self.execute_for(for_);
                self.env = previous;
                result
            }
            Stmt::Fun(fun) => {
                let function = Function::new(fun, &self.env, false);
                self.env.define(&fun.name, function.into());
                Ok(Flow::Normal)
            }
            Stmt::If(if_) => {
                if self.evaluate(&if_.cond)?.bool() {
                    self.execute(&if_.then)
                } else if let Some(else_) = &if_.else_ {
                    self.execute(else_)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Print(print) => {
                let value = self.evaluate(&print.value)?;
                writeln!(self.stdout, "{value}").map_err(|_| {
                    (Error::IoError(IoError::WriteError { file: "stdout".to_string() }), span.clone())
                })?;
                Ok(Flow::Normal)
            }
            Stmt::Return(return_) => {
                let value = match &return_.value {
                    Some(value) => self.evaluate(value)?,
                    None => Object::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Var(var) => {
                let value = match &var.value {
                    Some(value) => self.evaluate(value)?,
                    None => Object::Nil,
                };
                self.env.define(&var.name, value);
                Ok(Flow::Normal)
            }
            Stmt::While(while_) => {
                while self.evaluate(&while_.cond)?.bool() {
                    match self.execute(&while_.body)? {
                        Flow::Normal => (),
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_for(&mut self, for_: &StmtFor) -> Result<Flow> {
        if let Some(init) = &for_.init {
            self.execute(init)?;
        }
        loop {
            if let Some(cond) = &for_.cond {
                if !self.evaluate(cond)?.bool() {
                    return Ok(Flow::Normal);
                }
            }
            match self.execute(&for_.body)? {
                Flow::Normal => (),
                flow => return Ok(flow),
            }
            if let Some(incr) = &for_.incr {
                self.evaluate(incr)?;
            }
        }
    }

    fn evaluate(&mut self, expr_s: &ExprS) -> Result<Object> {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                let value = self.evaluate(&assign.value)?;
                self.assign(&assign.name, value.clone(), span)?;
                Ok(value)
            }
            Expr::Call(call) => {
                let callee = self.evaluate(&call.callee)?;
                callee.check_callable(span)?;
                let args = call.args.iter().map(|arg| self.evaluate(arg)).collect::<Result<Vec<_>>>()?;
                callee.call(self, args, span)
            }
            Expr::Fun(fun) => Ok(Function::new(fun, &self.env, false).into()),
            Expr::Get(get) => {
                let object = self.evaluate(&get.object)?;
                object.get(&get.name, span)
            }
            Expr::Grouping(group) => self.evaluate(group),
            Expr::Infix(infix) => {
                let lt = self.evaluate(&infix.lt)?;
                match infix.op {
                    OpInfix::LogicAnd if !lt.bool() => Ok(lt),
                    OpInfix::LogicOr if lt.bool() => Ok(lt),
                    OpInfix::LogicAnd | OpInfix::LogicOr => self.evaluate(&infix.rt),
                    op => {
                        let rt = self.evaluate(&infix.rt)?;
                        infix_op(op, lt, rt, span)
                    }
                }
            }
            Expr::Literal(literal) => Ok(match literal {
                ExprLiteral::Nil => Object::Nil,
                ExprLiteral::Bool(bool) => Object::Bool(*bool),
                ExprLiteral::Number(number) => Object::Number(*number),
                ExprLiteral::String(string) => Object::String(string.clone()),
            }),
            Expr::Prefix(prefix) => {
                let rt = self.evaluate(&prefix.rt)?;
                match (prefix.op, rt) {
                    (OpPrefix::Negate, Object::Number(number)) => Ok(Object::Number(-number)),
                    (OpPrefix::Not, rt) => Ok(Object::Bool(!rt.bool())),
                    (op, rt) => Err((
                        Error::TypeError(TypeError::UnsupportedOperandPrefix {
                            op: op.to_string(),
                            rt_type: rt.type_(),
                        }),
                        span.clone(),
                    )),
                }
            }
            Expr::Set(set) => {
                let object = self.evaluate(&set.object)?;
                let instance = object.instance(&set.name, span)?;
                let value = self.evaluate(&set.value)?;
                instance.set(&set.name, value.clone());
                Ok(value)
            }
            Expr::Super(super_) => {
                let depth = self.depth(span);
                let class = match self.env.get_at("super", depth) {
                    Some(Object::Class(ref class)) => class.clone(),
                    _ => unreachable!(r#""super" was resolved but is not a class"#),
                };
                let this = match depth.checked_sub(1).and_then(|depth| self.env.get_at("this", depth)) {
                    Some(Object::Instance(ref instance)) => instance.clone(),
                    _ => unreachable!(r#""this" was not found next to "super""#),
                };
                match class.method(&super_.name, this) {
                    Some(method) => Ok(method.into()),
                    None => Err((
                        Error::AttributeError(AttributeError::NoSuchAttribute {
                            type_: class.name.clone(),
                            name: super_.name.clone(),
                        }),
                        span.clone(),
                    )),
                }
            }
            Expr::This => self.lookup("this", span),
            Expr::Update(update) => {
                let old = match self.lookup(&update.name, span)? {
                    Object::Number(number) => number,
                    object => {
                        return Err((
                            Error::TypeError(TypeError::UnsupportedOperandPrefix {
                                op: update.op.to_string(),
                                rt_type: object.type_(),
                            }),
                            span.clone(),
                        ));
                    }
                };
                let new = match update.op {
                    OpUpdate::Increment => old + 1.0,
                    OpUpdate::Decrement => old - 1.0,
                };
                self.assign(&update.name, Object::Number(new), span)?;
                Ok(Object::Number(if update.prefix { new } else { old }))
            }
            Expr::Var(var) => self.lookup(&var.name, span),
        }
    }

    fn depth(&self, span: &Span) -> usize {
        match self.locals.get(span) {
            Some(depth) => *depth,
            None => unreachable!("expression at {span:?} was never resolved"),
        }
    }

    /// Reads a variable from the scope the resolver found for it, or from
    /// the global scope if it found none.
    fn lookup(&self, name: &str, span: &Span) -> Result<Object> {
        match self.locals.get(span) {
            Some(depth) => Ok(self
                .env
                .get_at(name, *depth)
                .unwrap_or_else(|| unreachable!("variable {name:?} was resolved but could not be found"))),
            None => self.globals.get(name, span),
        }
    }

    fn assign(&mut self, name: &str, value: Object, span: &Span) -> Result<()> {
        match self.locals.get(span) {
            Some(depth) => {
                self.env.assign_at(name, value, *depth);
                Ok(())
            }
            None => self.globals.assign(name, value, span),
        }
    }
}

fn infix_op(op: OpInfix, lt: Object, rt: Object, span: &Span) -> Result<Object> {
    match (op, lt, rt) {
        (OpInfix::Add, Object::Number(a), Object::Number(b)) => Ok(Object::Number(a + b)),
        (OpInfix::Add, Object::String(ref a), Object::String(ref b)) => Ok(Object::String(a.clone() + b)),
        (OpInfix::Subtract, Object::Number(a), Object::Number(b)) => Ok(Object::Number(a - b)),
        (OpInfix::Multiply, Object::Number(a), Object::Number(b)) => Ok(Object::Number(a * b)),
        (OpInfix::Divide, Object::Number(a), Object::Number(b)) => Ok(Object::Number(a / b)),
        (OpInfix::Less, Object::Number(a), Object::Number(b)) => Ok(Object::Bool(a < b)),
        (OpInfix::LessEqual, Object::Number(a), Object::Number(b)) => Ok(Object::Bool(a <= b)),
        (OpInfix::Greater, Object::Number(a), Object::Number(b)) => Ok(Object::Bool(a > b)),
        (OpInfix::GreaterEqual, Object::Number(a), Object::Number(b)) => Ok(Object::Bool(a >= b)),
        (OpInfix::Equal, a, b) => Ok(Object::Bool(a == b)),
        (OpInfix::NotEqual, a, b) => Ok(Object::Bool(a != b)),
        (op, a, b) => Err((
            Error::TypeError(TypeError::UnsupportedOperandInfix {
                op: op.to_string(),
                lt_type: a.type_(),
                rt_type: b.type_(),
            }),
            span.clone(),
        )),
    }
}
