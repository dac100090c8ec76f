pub mod ast;
pub mod lexer;
pub mod parser;
pub mod rpn;

use lox_common::error::{Error, ErrorS, SyntaxError};

use crate::ast::Program;
use crate::lexer::{Lexer, Token};
use crate::parser::Parser;

/// Parses `source` into a [`Program`]. Spans are shifted by `offset`.
///
/// Lexing errors do not stop parsing, so that every syntax error in the
/// source is reported together.
pub fn parse(source: &str, offset: usize) -> Result<Program, Vec<ErrorS>> {
    let mut errors = Vec::new();
    let tokens = Lexer::new(source, offset)
        .filter_map(|token| match token {
            Ok(token) => Some(token),
            Err(e) => {
                errors.push(e);
                None
            }
        })
        .collect::<Vec<_>>();

    match Parser::new(tokens, offset + source.len()).parse() {
        Ok(program) if errors.is_empty() => Ok(program),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}

/// Whether `source` has no unclosed braces, parentheses or strings. Used
/// by the REPL to decide if a line needs continuing.
pub fn is_complete(source: &str) -> bool {
    let mut depth = 0isize;
    for token in Lexer::new(source, 0) {
        match token {
            Ok((_, Token::LtBrace | Token::LtParen, _)) => depth += 1,
            Ok((_, Token::RtBrace | Token::RtParen, _)) => depth -= 1,
            Err((Error::SyntaxError(SyntaxError::UnterminatedString), _)) => return false,
            _ => (),
        }
    }
    depth <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExprInfix, ExprLiteral, ExprUpdate, OpInfix, OpUpdate, Stmt};

    use pretty_assertions::assert_eq;

    #[test]
    fn parse_precedence() {
        let program = parse("1 + 2 * 3;", 0).expect("valid program");
        let (stmt, span) = &program.stmts[0];
        assert_eq!(span, &(0..10));
        let Stmt::Expr(expr) = stmt else { panic!("expected expression statement") };
        let (Expr::Infix(infix), _) = &expr.value else { panic!("expected infix expression") };
        let ExprInfix { lt, op, rt } = infix.as_ref();
        assert_eq!(lt, &(Expr::Literal(ExprLiteral::Number(1.0)), 0..1));
        assert_eq!(op, &OpInfix::Add);
        assert!(matches!(&rt.0, Expr::Infix(infix) if infix.op == OpInfix::Multiply));
        assert_eq!(rt.1, 4..9);
    }

    #[test]
    fn parse_postfix_update() {
        let program = parse("i++;", 5).expect("valid program");
        let Stmt::Expr(expr) = &program.stmts[0].0 else { panic!("expected expression statement") };
        let exp = ExprUpdate { name: "i".to_string(), op: OpUpdate::Increment, prefix: false };
        assert_eq!(expr.value, (Expr::Update(exp), 5..8));
    }

    #[test]
    fn parse_reports_every_error() {
        let errors = parse("var = 1;\nprint ;\nvar ok = 2;", 0).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|(e, _)| matches!(e, Error::SyntaxError(_))));
    }

    #[test]
    fn parse_invalid_assignment_target() {
        let errors = parse("1 + 2 = 3;", 0).unwrap_err();
        assert_eq!(errors, vec![(Error::SyntaxError(SyntaxError::InvalidAssignmentTarget), 6..7)]);
    }

    #[test]
    fn parse_unexpected_eof() {
        let errors = parse("print 1", 0).unwrap_err();
        assert_eq!(
            errors,
            vec![(
                Error::SyntaxError(SyntaxError::UnrecognizedEOF {
                    expected: vec![r#"";""#.to_string()]
                }),
                7..7
            )]
        );
    }

    #[test]
    fn parse_class_and_function_literal() {
        let source = "class B < A { init(x) { this.x = x; } } var f = fn (a) { return a; };";
        let program = parse(source, 0).expect("valid program");
        assert_eq!(program.stmts.len(), 2);
        let Stmt::Class(class) = &program.stmts[0].0 else { panic!("expected class") };
        assert_eq!(class.name, "B");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].0.params, vec![("x".to_string(), 19..20)]);
        let Stmt::Var(var) = &program.stmts[1].0 else { panic!("expected var") };
        assert!(matches!(var.value, Some((Expr::Fun(_), _))));
    }

    #[test]
    fn complete_input() {
        assert!(is_complete("print 1;"));
        assert!(is_complete("fn f() { return 1; }"));
        assert!(!is_complete("fn f() {"));
        assert!(!is_complete("print \"abc"));
    }
}
