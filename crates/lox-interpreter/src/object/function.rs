use crate::env::Env;
use crate::interpreter::Flow;
use crate::object::{Callable, Instance, Object};
use crate::Interpreter;

use gc::{Finalize, Gc, Trace};
use log::trace;
use lox_common::error::Result;
use lox_common::types::{Span, Spanned};
use lox_syntax::ast::{StmtFun, StmtS};

use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::ops::Deref;
use std::rc::Rc;

/// A user-defined function together with the scope it was declared in.
#[derive(Clone, Debug, Finalize, Trace)]
pub struct Function(Gc<FunctionImpl>);

impl Function {
    pub fn new(decl: &Rc<StmtFun>, env: &Env, is_init: bool) -> Self {
        Function(Gc::new(FunctionImpl { decl: Rc::clone(decl), env: env.clone(), is_init }))
    }

    pub fn params(&self) -> &[Spanned<String>] {
        &self.decl.params
    }

    pub fn stmts(&self) -> &[StmtS] {
        &self.decl.body.stmts
    }

    /// Wraps the closure in a scope where `this` is `instance`.
    pub fn bind(&self, instance: Instance) -> Function {
        let env = Env::with_parent(&self.env);
        env.define("this", instance.into());
        Function::new(&self.decl, &env, self.is_init)
    }

    /// Checks if the function is a constructor.
    pub fn is_init(&self) -> bool {
        self.is_init
    }

    fn this(&self) -> Object {
        self.env
            .get_at("this", 0)
            .unwrap_or_else(|| unreachable!(r#""this" not present inside "init" function"#))
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn name(&self) -> &str {
        &self.decl.name
    }

    fn call_unchecked<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        trace!("calling {} with {} argument(s)", self, args.len());
        let env = Env::with_parent(&self.env);
        for ((param, _), arg) in self.params().iter().zip(args) {
            env.define(param, arg);
        }
        let flow = interpreter.execute_call(self.stmts(), env, span)?;
        if self.is_init() {
            return Ok(self.this());
        }
        Ok(match flow {
            Flow::Return(object) => object,
            Flow::Normal => Object::Nil,
        })
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Deref for Function {
    type Target = FunctionImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Function {}

#[allow(clippy::from_over_into)]
impl Into<Object> for Function {
    fn into(self) -> Object {
        Object::Function(self)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Finalize, Trace)]
pub struct FunctionImpl {
    #[unsafe_ignore_trace]
    pub decl: Rc<StmtFun>,
    pub env: Env,
    pub is_init: bool,
}
