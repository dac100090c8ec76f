mod env;
pub mod interpreter;
mod object;
mod resolver;

pub use crate::interpreter::Interpreter;

#[cfg(test)]
mod tests {
    use lox_common::error::{AttributeError, Error, ErrorS, NameError, RecursionError, SyntaxError, TypeError};
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(source: &str) -> (String, Result<(), Vec<ErrorS>>) {
        let mut interpreter = Interpreter::new(Vec::new());
        let result = interpreter.run(source);
        let stdout = String::from_utf8(interpreter.stdout().clone()).expect("stdout is utf-8");
        (stdout, result)
    }

    fn output(source: &str) -> String {
        let (stdout, result) = run(source);
        assert_eq!(result, Ok(()));
        stdout
    }

    fn error(source: &str) -> (String, Error) {
        let (stdout, result) = run(source);
        let mut errors = result.expect_err("program should fail");
        assert_eq!(errors.len(), 1);
        (stdout, errors.remove(0).0)
    }

    #[test]
    fn closures_keep_their_own_state() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var a = makeCounter();
            var b = makeCounter();
            print a(); print a(); print b(); print a();
        "#;
        assert_eq!(output(source), "1\n2\n1\n3\n");
    }

    #[test]
    fn closures_bind_at_declaration() {
        let source = r#"
            var a = "global";
            {
                fun show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;
        assert_eq!(output(source), "global\nglobal\n");
    }

    #[test]
    fn shadowing() {
        let source = r#"var a = "global"; { var a = "local"; print a; } print a;"#;
        assert_eq!(output(source), "local\nglobal\n");
    }

    #[test]
    fn super_dispatches_from_the_superclass() {
        let source = r#"
            class A {
                method() { return "A.method"; }
                test() { return this.method(); }
            }
            class B < A {
                method() { return "B.method"; }
                test() { return super.method() + " on " + this.method(); }
            }
            class C < B {}
            print C().test();
        "#;
        assert_eq!(output(source), "A.method on B.method\n");
    }

    #[test]
    fn initializer_always_yields_the_instance() {
        let source = r#"
            class Point {
                init(x) { this.x = x; return; }
            }
            var p = Point(3);
            print p.x;
            print p.init(4) == p;
            print p.x;
        "#;
        assert_eq!(output(source), "3\ntrue\n4\n");
    }

    #[test]
    fn return_unwinds_nested_statements() {
        let source = r#"
            fun f(n) {
                var i = 0;
                while (true) { { if (i == n) return i; } i = i + 1; }
            }
            print f(3);
            var after = "scope restored";
            print after;
        "#;
        assert_eq!(output(source), "3\nscope restored\n");
    }

    #[test]
    fn logical_operators_return_operands() {
        let source = r#"print nil or "yes"; print 0 and "zero is truthy"; print false and unknown;"#;
        assert_eq!(output(source), "yes\nzero is truthy\nfalse\n");
    }

    #[test]
    fn updates_return_old_or_new_value() {
        let source = "var i = 1; print i++; print i; print ++i; print i--; print --i;";
        assert_eq!(output(source), "1\n2\n3\n3\n1\n");
    }

    #[test]
    fn equality_is_by_value_for_primitives_and_identity_for_objects() {
        let source = r#"
            class A {}
            var a = A();
            print a == a; print a == A(); print "x" == "x"; print nil == false; print 1 == "1";
        "#;
        assert_eq!(output(source), "true\nfalse\ntrue\nfalse\nfalse\n");
    }

    #[test]
    fn values_render() {
        let source = r#"
            fun f() {}
            class A {}
            print 1.0; print 1.5; print nil; print f; print clock; print A; print A();
        "#;
        assert_eq!(output(source), "1\n1.5\nnil\n<fn f>\n<native fn>\nA\nA instance\n");
    }

    #[test]
    fn type_errors_do_not_coerce() {
        let (_, e) = error(r#""a" - 1;"#);
        assert_eq!(
            e,
            Error::TypeError(TypeError::UnsupportedOperandInfix {
                op: "-".to_string(),
                lt_type: "string".to_string(),
                rt_type: "number".to_string(),
            })
        );
        let (_, e) = error(r#""a" + 1;"#);
        assert_eq!(
            e,
            Error::TypeError(TypeError::UnsupportedOperandInfix {
                op: "+".to_string(),
                lt_type: "string".to_string(),
                rt_type: "number".to_string(),
            })
        );
        let (_, e) = error(r#"-"a";"#);
        assert_eq!(
            e,
            Error::TypeError(TypeError::UnsupportedOperandPrefix { op: "-".to_string(), rt_type: "string".to_string() })
        );
    }

    #[test]
    fn runtime_errors_stop_the_program() {
        let (stdout, e) = error("print 1; print undefined; print 2;");
        assert_eq!(stdout, "1\n");
        assert_eq!(e, Error::NameError(NameError::NotDefined { name: "undefined".to_string() }));
    }

    #[test]
    fn call_errors() {
        let (_, e) = error("fun f(a, b) {} f(1);");
        assert_eq!(
            e,
            Error::TypeError(TypeError::ArityMismatch { name: "f".to_string(), exp_args: 2, got_args: 1 })
        );
        let (_, e) = error("fun f(a, b) {} f(1, 2, 3);");
        assert_eq!(
            e,
            Error::TypeError(TypeError::ArityMismatch { name: "f".to_string(), exp_args: 2, got_args: 3 })
        );
        let message = e.to_string();
        assert!(message.contains("takes 2 arguments"), "{message}");
        assert!(message.contains("3 were given"), "{message}");
        let (_, e) = error(r#""text"();"#);
        assert_eq!(e, Error::TypeError(TypeError::NotCallable { type_: "string".to_string() }));
        let (_, e) = error("var NotAClass = 1; class A < NotAClass {}");
        assert_eq!(e, Error::TypeError(TypeError::SuperclassInvalidType { type_: "number".to_string() }));
    }

    #[test]
    fn deep_recursion_runs_until_the_call_limit() {
        let source = "fun down(n) { if (n == 0) return 0; return 1 + down(n - 1); } print down(4000);";
        assert_eq!(output(source), "4000\n");

        let mut interpreter = Interpreter::new(Vec::new());
        let errors = interpreter.run("fun forever() { forever(); } forever();").expect_err("recursion should fail");
        assert_eq!(
            errors.into_iter().map(|(e, _)| e).collect::<Vec<_>>(),
            vec![Error::RecursionError(RecursionError::MaxDepthExceeded { max_depth: crate::interpreter::MAX_CALL_DEPTH })]
        );
        // The failed call chain leaves no frames behind.
        interpreter.run("var x = 1; fun down(n) { if (n == 0) return x; return down(n - 1); }").expect("defines");
        interpreter.run("print down(4000);").expect("depth is restored");
        assert_eq!(interpreter.stdout(), b"1\n");
    }

    #[test]
    fn property_errors() {
        let (_, e) = error("class A {} A().missing;");
        assert_eq!(
            e,
            Error::AttributeError(AttributeError::NoSuchAttribute {
                type_: "A".to_string(),
                name: "missing".to_string()
            })
        );
        let (stdout, e) = error(r#"var x = 1; x.y = side_effect();"#);
        assert_eq!(stdout, "");
        assert_eq!(
            e,
            Error::AttributeError(AttributeError::NotAnInstance { type_: "number".to_string(), name: "y".to_string() })
        );
    }

    #[test]
    fn static_errors_prevent_execution() {
        let (stdout, result) = run("print 1; var x = x;");
        assert_eq!(stdout, "");
        let errors = result.expect_err("resolution should fail");
        assert_eq!(
            errors.into_iter().map(|(e, _)| e).collect::<Vec<_>>(),
            vec![Error::NameError(NameError::AccessInsideInitializer { name: "x".to_string() })]
        );

        let (stdout, result) = run("print 1; return;");
        assert_eq!(stdout, "");
        assert_eq!(result.map_err(|errors| errors.len()), Err(1));
        let (_, e) = error("class A { f() { super.f(); } }");
        assert_eq!(e, Error::SyntaxError(SyntaxError::SuperWithoutSuperclass { name: "A".to_string() }));
    }

    #[test]
    fn definitions_persist_across_runs() {
        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.run("var a = 1; fun add(b) { return a + b; }").expect("first run");
        interpreter.run("{ var c = 2; print add(c); }").expect("second run");
        interpreter.run("var a = a + 10; print add(0);").expect("third run");
        assert_eq!(interpreter.stdout(), b"3\n11\n");
        assert_eq!(interpreter.source().lines().count(), 3);
    }

    #[test]
    fn anonymous_functions() {
        let source = "var twice = fn (f, x) { return f(f(x)); }; print twice(fn (n) { return n * 2; }, 3);";
        assert_eq!(output(source), "12\n");
    }
}
