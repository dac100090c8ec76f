mod callable;
mod class;
mod function;
mod instance;
mod native;

use std::fmt::{self, Display, Formatter};
use std::io::Write;

pub use callable::Callable;
pub use class::{Class, INIT};
pub use function::Function;
use gc::{Finalize, Trace};
pub use instance::Instance;
use lox_common::error::{AttributeError, Error, Result, TypeError};
use lox_common::types::Span;
pub use native::Native;

use crate::Interpreter;

/// A runtime value.
#[derive(Clone, Debug, Finalize, Trace)]
pub enum Object {
    Bool(bool),
    Class(Class),
    Function(Function),
    Instance(Instance),
    Native(Native),
    Nil,
    Number(f64),
    String(String),
}

impl Object {
    /// Truthiness: only `nil` and `false` are falsey.
    pub fn bool(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    pub fn type_(&self) -> String {
        match self {
            Object::Bool(_) => "bool".to_string(),
            Object::Class(_) => "class".to_string(),
            Object::Function(_) | Object::Native(_) => "function".to_string(),
            Object::Instance(instance) => instance.class().name.clone(),
            Object::Nil => "nil".to_string(),
            Object::Number(_) => "number".to_string(),
            Object::String(_) => "string".to_string(),
        }
    }

    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        self.instance(name, span)?.get(name, span)
    }

    /// The instance whose property `name` is being accessed.
    pub fn instance(&self, name: &str, span: &Span) -> Result<&Instance> {
        match self {
            Object::Instance(instance) => Ok(instance),
            _ => Err((
                Error::AttributeError(AttributeError::NotAnInstance { type_: self.type_(), name: name.to_string() }),
                span.clone(),
            )),
        }
    }

    /// Fails unless this object is a class, function or native.
    pub fn check_callable(&self, span: &Span) -> Result<()> {
        match self {
            Object::Class(_) | Object::Function(_) | Object::Native(_) => Ok(()),
            object => Err((Error::TypeError(TypeError::NotCallable { type_: object.type_() }), span.clone())),
        }
    }

    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        match self {
            Object::Class(class) => class.call(interpreter, args, span),
            Object::Function(function) => function.call(interpreter, args, span),
            Object::Native(native) => native.call(interpreter, args, span),
            object => Err((Error::TypeError(TypeError::NotCallable { type_: object.type_() }), span.clone())),
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Bool(bool) => write!(f, "{}", bool),
            Object::Class(class) => write!(f, "{}", class),
            Object::Function(function) => write!(f, "{}", function),
            Object::Instance(instance) => write!(f, "{}", instance),
            Object::Native(native) => write!(f, "{}", native),
            Object::Nil => write!(f, "nil"),
            Object::Number(number) => write!(f, "{}", number),
            Object::String(string) => write!(f, "{}", string),
        }
    }
}

/// Primitives compare by value; classes, functions and instances by identity.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Bool(b1), Object::Bool(b2)) => b1 == b2,
            (Object::Class(c1), Object::Class(c2)) => c1 == c2,
            (Object::Function(f1), Object::Function(f2)) => f1 == f2,
            (Object::Instance(i1), Object::Instance(i2)) => i1 == i2,
            (Object::Native(n1), Object::Native(n2)) => n1 == n2,
            (Object::Nil, Object::Nil) => true,
            (Object::Number(n1), Object::Number(n2)) => n1 == n2,
            (Object::String(s1), Object::String(s2)) => s1 == s2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        assert!(!Object::Nil.bool());
        assert!(!Object::Bool(false).bool());
        assert!(Object::Bool(true).bool());
        assert!(Object::Number(0.0).bool());
        assert!(Object::String(String::new()).bool());
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(Object::Number(3.0).to_string(), "3");
        assert_eq!(Object::Number(2.5).to_string(), "2.5");
        assert_eq!(Object::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Object::Number(-0.0).to_string(), "-0");
        assert_eq!(Object::Number(f64::INFINITY).to_string(), "inf");
        assert_eq!(Object::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Object::Nil.to_string(), "nil");
        assert_eq!(Native::Clock.to_string(), "<native fn>");
    }

    #[test]
    fn equality_does_not_coerce() {
        assert_eq!(Object::Nil, Object::Nil);
        assert_ne!(Object::Nil, Object::Bool(false));
        assert_ne!(Object::Number(1.0), Object::String("1".to_string()));
        assert_ne!(Object::Number(f64::NAN), Object::Number(f64::NAN));
        assert_eq!(Object::Number(0.0), Object::Number(-0.0));
    }

    #[test]
    fn property_access_requires_an_instance() {
        let exp = || {
            Err((
                Error::AttributeError(AttributeError::NotAnInstance {
                    type_: "number".to_string(),
                    name: "x".to_string(),
                }),
                0..3,
            ))
        };
        assert_eq!(Object::Number(1.0).get("x", &(0..3)), exp());
        assert_eq!(Object::Number(1.0).instance("x", &(0..3)).map(|_| ()), exp().map(|_: Object| ()));
    }
}
