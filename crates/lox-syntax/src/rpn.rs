//! Reverse Polish rendering of expressions: operands first, separated by
//! spaces, each operator after the operands it applies to.

use crate::ast::{Expr, ExprLiteral, ExprS, OpPrefix};

pub fn to_rpn(expr: &ExprS) -> String {
    let mut parts = Vec::new();
    push(&expr.0, &mut parts);
    parts.join(" ")
}

fn push(expr: &Expr, parts: &mut Vec<String>) {
    match expr {
        Expr::Assign(assign) => {
            push(&assign.value.0, parts);
            parts.push(assign.name.clone());
            parts.push("=".to_string());
        }
        Expr::Call(call) => {
            for (arg, _) in &call.args {
                push(arg, parts);
            }
            push(&call.callee.0, parts);
            parts.push(format!("call/{}", call.args.len()));
        }
        Expr::Fun(fun) => parts.push(format!("<fn {}>", fun.name)),
        Expr::Get(get) => {
            push(&get.object.0, parts);
            parts.push(format!(".{}", get.name));
        }
        Expr::Grouping(inner) => push(&inner.0, parts),
        Expr::Infix(infix) => {
            push(&infix.lt.0, parts);
            push(&infix.rt.0, parts);
            parts.push(infix.op.to_string());
        }
        Expr::Literal(literal) => parts.push(match literal {
            ExprLiteral::Nil => "nil".to_string(),
            ExprLiteral::Bool(bool) => bool.to_string(),
            ExprLiteral::Number(number) => number.to_string(),
            ExprLiteral::String(string) => format!("{string:?}"),
        }),
        Expr::Prefix(prefix) => {
            push(&prefix.rt.0, parts);
            // `-` alone would be ambiguous with subtraction.
            parts.push(match prefix.op {
                OpPrefix::Negate => "neg".to_string(),
                OpPrefix::Not => "!".to_string(),
            });
        }
        Expr::Set(set) => {
            push(&set.object.0, parts);
            push(&set.value.0, parts);
            parts.push(format!(".{}=", set.name));
        }
        Expr::Super(super_) => parts.push(format!("super.{}", super_.name)),
        Expr::This => parts.push("this".to_string()),
        Expr::Update(update) if update.prefix => {
            parts.push(format!("{}{}", update.op, update.name));
        }
        Expr::Update(update) => parts.push(format!("{}{}", update.name, update.op)),
        Expr::Var(var) => parts.push(var.name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;

    use pretty_assertions::assert_eq;

    fn rpn(source: &str) -> String {
        let program = crate::parse(source, 0).expect("valid program");
        match &program.stmts[0].0 {
            Stmt::Expr(expr) => to_rpn(&expr.value),
            stmt => panic!("expected expression statement, got {stmt:?}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(rpn("(1 + 2) * 4 - 3;"), "1 2 + 4 * 3 -");
        assert_eq!(rpn("-a / (b - c);"), "a neg b c - /");
    }

    #[test]
    fn assignment_and_calls() {
        assert_eq!(rpn("x = f(1, y) == !z;"), "1 y f call/2 z ! == x =");
        assert_eq!(rpn("a.b.c = \"s\";"), "a .b \"s\" .c=");
    }
}
