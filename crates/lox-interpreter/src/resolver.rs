use lox_common::error::{Error, ErrorS, NameError, SyntaxError};
use lox_common::types::Span;
use lox_syntax::ast::{Expr, ExprS, Program, Stmt, StmtFun, StmtS};
use rustc_hash::FxHashMap;

use crate::interpreter::Locals;
use crate::object::INIT;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum FunctionType {
    #[default]
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum ClassType {
    #[default]
    None,
    Class,
    Subclass,
}

/// Computes how many scopes separate every local variable reference from
/// its binding, and rejects misplaced `return`, `this` and `super`.
///
/// References that are not found in any enclosing scope are left out of
/// the result and are looked up in the global scope at runtime.
#[derive(Debug, Default)]
pub struct Resolver {
    scopes: Vec<FxHashMap<String, bool>>,
    /// Top-level names, tracked only to catch `var x = x;` at the top level.
    globals: FxHashMap<String, bool>,
    locals: Locals,
    errors: Vec<ErrorS>,
    function: FunctionType,
    class: ClassType,
    class_name: String,
}

impl Resolver {
    /// A resolver that knows `names` are already bound in the global scope.
    pub fn with_globals<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let globals = names.into_iter().map(|name| (name.to_string(), true)).collect();
        Self { globals, ..Self::default() }
    }

    pub fn resolve(mut self, program: &Program) -> Result<Locals, Vec<ErrorS>> {
        for stmt_s in &program.stmts {
            self.resolve_stmt(stmt_s);
        }
        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    fn resolve_stmt(&mut self, stmt_s: &StmtS) {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                self.begin_scope();
                for stmt_s in &block.stmts {
                    self.resolve_stmt(stmt_s);
                }
                self.end_scope();
            }
            Stmt::Class(class) => {
                let enclosing = self.class;
                let enclosing_name = std::mem::replace(&mut self.class_name, class.name.clone());
                self.class = ClassType::Class;
                self.declare_define(&class.name, span);

                if let Some(super_) = &class.super_ {
                    if let (Expr::Var(var), super_span) = super_ {
                        if var.name == class.name {
                            self.error(
                                SyntaxError::InheritFromSelf { name: class.name.clone() },
                                super_span,
                            );
                        }
                    }
                    self.class = ClassType::Subclass;
                    self.resolve_expr(super_);
                    self.begin_scope();
                    self.define("super");
                }

                self.begin_scope();
                self.define("this");
                for (method, _) in &class.methods {
                    let type_ =
                        if method.name == INIT { FunctionType::Initializer } else { FunctionType::Method };
                    self.resolve_fun(method, type_);
                }
                self.end_scope();

                if class.super_.is_some() {
                    self.end_scope();
                }
                self.class = enclosing;
                self.class_name = enclosing_name;
            }
            Stmt::Expr(expr) => self.resolve_expr(&expr.value),
            Stmt::For(for_) => {
                self.begin_scope();
                if let Some(init) = &for_.init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = &for_.cond {
                    self.resolve_expr(cond);
                }
                if let Some(incr) = &for_.incr {
                    self.resolve_expr(incr);
                }
                self.resolve_stmt(&for_.body);
                self.end_scope();
            }
            Stmt::Fun(fun) => {
                self.declare_define(&fun.name, span);
                self.resolve_fun(fun, FunctionType::Function);
            }
            Stmt::If(if_) => {
                self.resolve_expr(&if_.cond);
                self.resolve_stmt(&if_.then);
                if let Some(else_) = &if_.else_ {
                    self.resolve_stmt(else_);
                }
            }
            Stmt::Print(print) => self.resolve_expr(&print.value),
            Stmt::Return(return_) => {
                if self.function == FunctionType::None {
                    self.error(SyntaxError::ReturnOutsideFunction, span);
                }
                if let Some(value) = &return_.value {
                    if self.function == FunctionType::Initializer {
                        self.error(SyntaxError::ReturnValueInInitializer, span);
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var(var) => {
                self.declare(&var.name, span);
                if let Some(value) = &var.value {
                    self.resolve_expr(value);
                }
                self.define(&var.name);
            }
            Stmt::While(while_) => {
                self.resolve_expr(&while_.cond);
                self.resolve_stmt(&while_.body);
            }
        }
    }

    fn resolve_expr(&mut self, expr_s: &ExprS) {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value);
                self.access(&assign.name, span);
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee);
                for arg in &call.args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Fun(fun) => self.resolve_fun(fun, FunctionType::Function),
            Expr::Get(get) => self.resolve_expr(&get.object),
            Expr::Grouping(group) => self.resolve_expr(group),
            Expr::Infix(infix) => {
                self.resolve_expr(&infix.lt);
                self.resolve_expr(&infix.rt);
            }
            Expr::Literal(_) => (),
            Expr::Prefix(prefix) => self.resolve_expr(&prefix.rt),
            Expr::Set(set) => {
                self.resolve_expr(&set.value);
                self.resolve_expr(&set.object);
            }
            Expr::Super(_) => {
                match self.class {
                    ClassType::None => self.error(SyntaxError::SuperOutsideClass, span),
                    ClassType::Class => {
                        let name = self.class_name.clone();
                        self.error(SyntaxError::SuperWithoutSuperclass { name }, span)
                    }
                    ClassType::Subclass => (),
                }
                self.access("super", span);
            }
            Expr::This => {
                if self.class == ClassType::None {
                    self.error(SyntaxError::ThisOutsideClass, span);
                }
                self.access("this", span);
            }
            Expr::Update(update) => self.access(&update.name, span),
            Expr::Var(var) => {
                let scope = self.scopes.last().unwrap_or(&self.globals);
                if scope.get(&var.name) == Some(&false) {
                    self.errors.push((
                        Error::NameError(NameError::AccessInsideInitializer { name: var.name.clone() }),
                        span.clone(),
                    ));
                }
                self.access(&var.name, span);
            }
        }
    }

    fn resolve_fun(&mut self, fun: &StmtFun, type_: FunctionType) {
        let enclosing = self.function;
        self.function = type_;

        self.begin_scope();
        for (param, span) in &fun.params {
            self.declare_define(param, span);
        }
        for stmt_s in &fun.body.stmts {
            self.resolve_stmt(stmt_s);
        }
        self.end_scope();

        self.function = enclosing;
    }

    fn declare_define(&mut self, name: &str, span: &Span) {
        self.declare(name, span);
        self.define(name);
    }

    /// Marks `name` as bound but not yet usable. Redeclaring a name in the
    /// same local scope is an error; the global scope allows it.
    fn declare(&mut self, name: &str, span: &Span) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if scope.insert(name.to_string(), false).is_some() {
                    self.errors.push((
                        Error::NameError(NameError::AlreadyDefined { name: name.to_string() }),
                        span.clone(),
                    ));
                }
            }
            None => {
                self.globals.entry(name.to_string()).or_insert(false);
            }
        }
    }

    fn define(&mut self, name: &str) {
        let scope = self.scopes.last_mut().unwrap_or(&mut self.globals);
        scope.insert(name.to_string(), true);
    }

    /// Records the distance from the innermost scope to the scope that binds
    /// `name`, keyed by the span of the referencing expression.
    fn access(&mut self, name: &str, span: &Span) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.locals.insert(span.clone(), depth);
                return;
            }
        }
    }

    fn error(&mut self, error: SyntaxError, span: &Span) {
        self.errors.push((Error::SyntaxError(error), span.clone()));
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop().unwrap_or_else(|| unreachable!("attempted to pop global scope"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn resolve(source: &str) -> Result<Locals, Vec<ErrorS>> {
        let program = lox_syntax::parse(source, 0).expect("source should parse");
        Resolver::default().resolve(&program)
    }

    fn errors(source: &str) -> Vec<Error> {
        resolve(source).expect_err("resolution should fail").into_iter().map(|(e, _)| e).collect()
    }

    #[test]
    fn globals_are_left_out() {
        let locals = resolve("var a = 1; print a; a = 2;").expect("resolves");
        assert!(locals.is_empty());
    }

    #[test]
    fn distances_count_scopes_from_the_innermost() {
        let source = "{ var a = 1; { fun f() { print a; } } }";
        let locals = resolve(source).expect("resolves");
        let a = source.rfind('a').expect("reference to a");
        // f -> inner block -> outer block
        assert_eq!(locals.get(&(a..a + 1)), Some(&2));
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let source = r#"
            fun counter() {
                var i = 0;
                fun incr() { i = i + 1; return i; }
                return incr;
            }
            class A { init(x) { this.x = x; } get() { return this.x; } }
            class B < A { get() { return super.get() + 1; } }
            for (var i = 0; i < 3; i++) { print i; }
        "#;
        let program = lox_syntax::parse(source, 0).expect("source should parse");
        let first = Resolver::default().resolve(&program).expect("resolves");
        let second = Resolver::default().resolve(&program).expect("resolves");
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn reading_a_variable_in_its_own_initializer() {
        let exp = vec![Error::NameError(NameError::AccessInsideInitializer { name: "x".to_string() })];
        assert_eq!(errors("var x = x;"), exp);
        assert_eq!(errors("{ var x = x; }"), exp);
        assert!(resolve("var x = 1; var x = x;").is_ok());
        assert!(Resolver::with_globals(["x"]).resolve(&lox_syntax::parse("var x = x;", 0).unwrap()).is_ok());
    }

    #[test]
    fn local_redeclaration() {
        assert_eq!(
            errors("{ var a; var a; }"),
            vec![Error::NameError(NameError::AlreadyDefined { name: "a".to_string() })]
        );
        assert!(resolve("var a; var a;").is_ok());
    }

    #[test]
    fn duplicate_parameter_is_reported_at_the_parameter() {
        let errors = resolve("fun f(a, b, a) {}").expect_err("duplicate parameter");
        assert_eq!(errors, vec![(Error::NameError(NameError::AlreadyDefined { name: "a".to_string() }), 12..13)]);
    }

    #[test]
    fn misplaced_keywords_are_all_reported() {
        let source = r#"
            return 1;
            print this;
            print super.x;
            class A { init() { return 1; } m() { return super.m(); } }
            class B < B {}
        "#;
        assert_eq!(
            errors(source),
            vec![
                Error::SyntaxError(SyntaxError::ReturnOutsideFunction),
                Error::SyntaxError(SyntaxError::ThisOutsideClass),
                Error::SyntaxError(SyntaxError::SuperOutsideClass),
                Error::SyntaxError(SyntaxError::ReturnValueInInitializer),
                Error::SyntaxError(SyntaxError::SuperWithoutSuperclass { name: "A".to_string() }),
                Error::SyntaxError(SyntaxError::InheritFromSelf { name: "B".to_string() }),
            ]
        );
    }

    #[test]
    fn bare_return_in_initializer_is_allowed() {
        assert!(resolve("class A { init() { return; } }").is_ok());
    }
}
