use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::ops::Deref;

use gc::{Finalize, Gc, Trace};
use lox_common::error::Result;
use lox_common::types::Span;
use lox_syntax::ast::StmtClass;
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::object::{Callable, Function, Instance, Object};
use crate::Interpreter;

/// Name of the method that initializes new instances.
pub const INIT: &str = "init";

#[derive(Clone, Debug, Finalize, Trace)]
pub struct Class(Gc<ClassImpl>);

impl Class {
    /// Builds the class for `decl`. Methods close over `env`, extended with a
    /// scope binding `super` when there is a superclass.
    pub fn new(decl: &StmtClass, super_: Option<Class>, env: &Env) -> Self {
        let methods = {
            let mut env = env.clone();
            if let Some(super_) = &super_ {
                env = Env::with_parent(&env);
                env.define("super", super_.clone().into());
            }
            decl.methods
                .iter()
                .map(|(decl, _)| {
                    let function = Function::new(decl, &env, decl.name == INIT);
                    (decl.name.to_string(), function)
                })
                .collect()
        };

        let class = ClassImpl { name: decl.name.clone(), super_, methods };
        Self(Gc::new(class))
    }

    /// Finds `name` on this class or, failing that, on its ancestors.
    pub fn find_method(&self, name: &str) -> Option<Function> {
        match self.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self.super_.as_ref()?.find_method(name),
        }
    }

    /// Finds `name` and binds it to `this`.
    pub fn method(&self, name: &str, this: Instance) -> Option<Function> {
        Some(self.find_method(name)?.bind(this))
    }
}

impl Callable for Class {
    fn arity(&self) -> usize {
        match self.find_method(INIT) {
            Some(function) => function.arity(),
            None => 0,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn call_unchecked<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        let instance = Instance::new(self);
        if let Some(init) = self.method(INIT, instance.clone()) {
            init.call_unchecked(interpreter, args, span)?;
        }
        Ok(instance.into())
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Deref for Class {
    type Target = ClassImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Class {}

#[allow(clippy::from_over_into)]
impl Into<Object> for Class {
    fn into(self) -> Object {
        Object::Class(self)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Finalize, Trace)]
pub struct ClassImpl {
    pub name: String,
    pub super_: Option<Class>,
    pub methods: FxHashMap<String, Function>,
}
