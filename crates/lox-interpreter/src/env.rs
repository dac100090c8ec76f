use std::ops::Deref;

use gc::{Finalize, Gc, GcCell, Trace};
use lox_common::error::{Error, NameError, Result};
use lox_common::types::Span;
use rustc_hash::FxHashMap;

use crate::object::Object;

/// A scope frame. Frames are shared between every closure and call that
/// captured them; a child only ever points up at its parent.
#[derive(Clone, Debug, Default, Finalize, Trace)]
pub struct Env(Gc<GcCell<EnvImpl>>);

impl Deref for Env {
    type Target = Gc<GcCell<EnvImpl>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Env {
    pub fn with_parent(parent: &Env) -> Self {
        let env = EnvImpl { map: FxHashMap::default(), parent: Some(parent.clone()) };
        Self(Gc::new(GcCell::new(env)))
    }

    /// Binds `name` in this frame, replacing any previous binding.
    pub fn define(&self, name: &str, value: Object) {
        self.borrow_mut().map.insert(name.to_string(), value);
    }

    /// Names bound in this frame alone.
    pub fn names(&self) -> Vec<String> {
        self.borrow().map.keys().cloned().collect()
    }

    /// Looks `name` up in this frame, then in every ancestor.
    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        let env = self.borrow();
        match (env.map.get(name), &env.parent) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(parent)) => parent.get(name, span),
            (None, None) => Err(not_defined(name, span)),
        }
    }

    /// Reads `name` from the frame exactly `depth` hops up the chain.
    pub fn get_at(&self, name: &str, depth: usize) -> Option<Object> {
        if depth == 0 {
            self.borrow().map.get(name).cloned()
        } else {
            self.ancestor(depth).get_at(name, 0)
        }
    }

    /// Rebinds an existing `name` in this frame or the nearest ancestor that
    /// has it.
    pub fn assign(&self, name: &str, value: Object, span: &Span) -> Result<()> {
        let mut env = self.borrow_mut();
        if let Some(entry) = env.map.get_mut(name) {
            *entry = value;
            return Ok(());
        }
        match &env.parent {
            Some(parent) => parent.assign(name, value, span),
            None => Err(not_defined(name, span)),
        }
    }

    /// Writes `name` into the frame exactly `depth` hops up the chain.
    pub fn assign_at(&self, name: &str, value: Object, depth: usize) {
        if depth == 0 {
            self.define(name, value);
        } else {
            self.ancestor(depth).define(name, value);
        }
    }

    fn ancestor(&self, depth: usize) -> Env {
        let mut env = self.clone();
        for _ in 0..depth {
            let parent = env.borrow().parent.clone();
            env = parent.unwrap_or_else(|| unreachable!("scope depth {depth} exceeds the environment chain"));
        }
        env
    }
}

fn not_defined(name: &str, span: &Span) -> (Error, Span) {
    (Error::NameError(NameError::NotDefined { name: name.to_string() }), span.clone())
}

#[derive(Debug, Default, Finalize, Trace)]
pub struct EnvImpl {
    map: FxHashMap<String, Object>,
    parent: Option<Env>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn define_overwrites_in_current_frame() {
        let env = Env::default();
        env.define("a", Object::Number(1.0));
        env.define("a", Object::Number(2.0));
        assert_eq!(env.get("a", &(0..1)), Ok(Object::Number(2.0)));
    }

    #[test]
    fn get_and_assign_walk_the_chain() {
        let globals = Env::default();
        globals.define("a", Object::Number(1.0));
        let inner = Env::with_parent(&Env::with_parent(&globals));

        assert_eq!(inner.get("a", &(0..1)), Ok(Object::Number(1.0)));
        inner.assign("a", Object::Bool(true), &(0..1)).expect("a is defined");
        assert_eq!(globals.get("a", &(0..1)), Ok(Object::Bool(true)));
        assert!(inner.names().is_empty());
        assert_eq!(globals.names(), vec!["a".to_string()]);
    }

    #[test]
    fn missing_names_are_undefined() {
        let env = Env::with_parent(&Env::default());
        let exp = Err((Error::NameError(NameError::NotDefined { name: "b".to_string() }), 3..4));
        assert_eq!(env.get("b", &(3..4)), exp);
        assert_eq!(env.assign("b", Object::Nil, &(3..4)), exp.map(|_| ()));
    }

    #[test]
    fn depth_addresses_one_frame() {
        let outer = Env::default();
        outer.define("a", Object::String("outer".to_string()));
        let inner = Env::with_parent(&outer);
        inner.define("a", Object::String("inner".to_string()));

        assert_eq!(inner.get_at("a", 0), Some(Object::String("inner".to_string())));
        assert_eq!(inner.get_at("a", 1), Some(Object::String("outer".to_string())));

        inner.assign_at("a", Object::Nil, 1);
        assert_eq!(outer.get_at("a", 0), Some(Object::Nil));
        assert_eq!(inner.get_at("a", 0), Some(Object::String("inner".to_string())));
    }
}
