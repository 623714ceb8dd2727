//! Backend-specific printing of expressions and of the small amount of
//! boilerplate (comments, declarations, lambdas, string literals) the macro
//! packages need to emit.

use std::rc::Rc;

use crate::expr::{Expr, Literal, Op};
use crate::util::ListDisplay;

/// Binding strength of a printed fragment, used to decide where parentheses
/// are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Sum,
    Product,
    Unary,
    Power,
    Atom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Printed {
    pub text: String,
    pub precedence: Precedence,
}

impl Printed {
    pub fn atom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            precedence: Precedence::Atom,
        }
    }

    fn at_least(self, precedence: Precedence) -> String {
        if self.precedence < precedence {
            format!("({})", self.text)
        } else {
            self.text
        }
    }
}

/// One case of a map-shaped lambda: the concrete index values the case
/// applies to and the printed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaCase {
    pub values: Vec<usize>,
    pub value: String,
}

pub trait LanguagePrinter {
    fn backend(&self) -> &'static str;

    fn literal(&self, literal: &Literal) -> Printed {
        match literal {
            Literal::Int(i) if *i < 0 => Printed {
                text: i.to_string(),
                precedence: Precedence::Unary,
            },
            Literal::Int(i) => Printed::atom(i.to_string()),
        }
    }

    /// Prints a compound node from its already printed children.
    fn node(&self, op: &Op, children: Vec<Printed>) -> Printed {
        match op {
            Op::Add => {
                let mut text = String::new();
                for (i, child) in children.into_iter().enumerate() {
                    let child = child.at_least(Precedence::Sum);
                    match child.strip_prefix('-') {
                        Some(rest) if i > 0 => {
                            text.push_str(" - ");
                            text.push_str(rest);
                        }
                        _ => {
                            if i > 0 {
                                text.push_str(" + ");
                            }
                            text.push_str(&child);
                        }
                    }
                }
                Printed {
                    text,
                    precedence: Precedence::Sum,
                }
            }
            Op::Mul => Printed {
                text: children
                    .into_iter()
                    .map(|c| {
                        if c.precedence == Precedence::Unary {
                            format!("({})", c.text)
                        } else {
                            c.at_least(Precedence::Product)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("*"),
                precedence: Precedence::Product,
            },
            Op::Neg => Printed {
                text: format!(
                    "-{}",
                    children
                        .into_iter()
                        .next()
                        .map(|c| c.at_least(Precedence::Power))
                        .unwrap_or_default()
                ),
                precedence: Precedence::Unary,
            },
            Op::Pow => self.power(children),
            Op::Call(name) => Printed::atom(format!(
                "{name}({})",
                ListDisplay(
                    &children.into_iter().map(|c| c.text).collect::<Vec<_>>(),
                    ", "
                )
            )),
        }
    }

    fn power(&self, children: Vec<Printed>) -> Printed;

    /// Prints `expr`, giving `subst` the chance to replace any compound
    /// subexpression (other than `expr` itself) by a name.
    fn print_with(&self, expr: &Expr, subst: &mut dyn FnMut(&Expr) -> Option<String>) -> String {
        self.printed_with(expr, subst).text
    }

    fn printed_with(&self, expr: &Expr, subst: &mut dyn FnMut(&Expr) -> Option<String>) -> Printed {
        match expr {
            Expr::Lit(lit) => self.literal(lit),
            Expr::Var(v) => Printed::atom(v.to_string()),
            Expr::Node(op, children) => {
                let children = children
                    .iter()
                    .map(|c| match subst(c) {
                        Some(name) => Printed::atom(name),
                        None => self.printed_with(c, &mut *subst),
                    })
                    .collect();
                self.node(op, children)
            }
        }
    }

    fn print(&self, expr: &Expr) -> String {
        self.print_with(expr, &mut |_| None)
    }

    fn comment(&self, text: &str) -> String;

    /// The declaration template used when a template never supplies one.
    fn default_declaration(&self) -> &'static str;

    /// The `left`, `mid` and `right` fragments surrounding a lambda
    /// declaration.
    fn lambda_fragments(&self) -> (&'static str, &'static str, &'static str);

    fn lambda_invocation(&self, name: &str, args: &[String]) -> String {
        format!("{name}({})", ListDisplay(args, ", "))
    }

    fn atomic_lambda(&self, params: &[String], value: &str) -> String;

    fn map_lambda(&self, params: &[String], cases: &[LambdaCase]) -> String;

    /// Prefix and suffix wrapped around each line of an embedded string.
    fn string_delimiters(&self) -> (&'static str, &'static str);

    fn escape_string(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        for c in line.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CppPrinter;

impl LanguagePrinter for CppPrinter {
    fn backend(&self) -> &'static str {
        "cpp"
    }

    fn power(&self, children: Vec<Printed>) -> Printed {
        let args = children.into_iter().map(|c| c.text).collect::<Vec<_>>();
        Printed::atom(format!("std::pow({})", ListDisplay(&args, ", ")))
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}")
    }

    fn default_declaration(&self) -> &'static str {
        "const auto $1 = $2;"
    }

    fn lambda_fragments(&self) -> (&'static str, &'static str, &'static str) {
        ("auto ", " = ", ";")
    }

    fn atomic_lambda(&self, params: &[String], value: &str) -> String {
        let params = params
            .iter()
            .map(|p| format!("unsigned int {p}"))
            .collect::<Vec<_>>();
        format!(
            "[&]({}) -> double {{ return {value}; }}",
            ListDisplay(&params, ", ")
        )
    }

    fn map_lambda(&self, params: &[String], cases: &[LambdaCase]) -> String {
        let mut body = String::new();
        for case in cases {
            let conditions = params
                .iter()
                .zip(&case.values)
                .map(|(p, v)| format!("{p} == {v}"))
                .collect::<Vec<_>>();
            body.push_str(&format!(
                " if ({}) return {};",
                ListDisplay(&conditions, " && "),
                case.value
            ));
        }
        let declared = params
            .iter()
            .map(|p| format!("unsigned int {p}"))
            .collect::<Vec<_>>();
        format!(
            "[&]({}) -> double {{{body} return 0.0; }}",
            ListDisplay(&declared, ", ")
        )
    }

    fn string_delimiters(&self) -> (&'static str, &'static str) {
        ("\"", "\\n\"")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonPrinter;

impl LanguagePrinter for PythonPrinter {
    fn backend(&self) -> &'static str {
        "python"
    }

    fn power(&self, children: Vec<Printed>) -> Printed {
        let mut children = children.into_iter();
        let base = children
            .next()
            .map(|c| c.at_least(Precedence::Atom))
            .unwrap_or_default();
        let exponent = children
            .next()
            .map(|c| c.at_least(Precedence::Power))
            .unwrap_or_default();
        Printed {
            text: format!("{base}**{exponent}"),
            precedence: Precedence::Power,
        }
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}")
    }

    fn default_declaration(&self) -> &'static str {
        "$1 = $2"
    }

    fn lambda_fragments(&self) -> (&'static str, &'static str, &'static str) {
        ("", " = ", "")
    }

    fn atomic_lambda(&self, params: &[String], value: &str) -> String {
        if params.is_empty() {
            format!("lambda: {value}")
        } else {
            format!("lambda {}: {value}", ListDisplay(params, ", "))
        }
    }

    fn map_lambda(&self, params: &[String], cases: &[LambdaCase]) -> String {
        let entries = cases
            .iter()
            .map(|case| {
                let key = case
                    .values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>();
                format!("({},): {}", ListDisplay(&key, ", "), case.value)
            })
            .collect::<Vec<_>>();
        format!(
            "lambda {}: {{{}}}[({},)]",
            ListDisplay(params, ", "),
            ListDisplay(&entries, ", "),
            ListDisplay(params, ", ")
        )
    }

    fn string_delimiters(&self) -> (&'static str, &'static str) {
        ("\"", "\\n\"")
    }
}

/// Looks up the printer for a backend name.
pub fn printer_for_backend(backend: &str) -> Option<Rc<dyn LanguagePrinter>> {
    match backend {
        "cpp" => Some(Rc::new(CppPrinter)),
        "python" => Some(Rc::new(PythonPrinter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr;

    #[test]
    fn cpp_parenthesises_by_precedence() {
        let p = CppPrinter;
        assert_eq!(p.print(&expr!(mul (add a b) c)), "(a + b)*c");
        assert_eq!(p.print(&expr!(add a (neg b))), "a - b");
        assert_eq!(p.print(&expr!(neg (mul a b))), "-(a*b)");
        assert_eq!(p.print(&expr!(pow (add a b) 2)), "std::pow(a + b, 2)");
        assert_eq!(p.print(&expr!(mul a (-2))), "a*(-2)");
    }

    #[test]
    fn python_power() {
        let p = PythonPrinter;
        assert_eq!(p.print(&expr!(pow (add a b) 2)), "(a + b)**2");
        assert_eq!(p.print(&expr!(mul (pow x 2) y)), "x**2*y");
    }

    #[test]
    fn substitution_skips_the_root() {
        let p = CppPrinter;
        let e = expr!(mul (add a b) (add a b));
        let printed = p.print_with(&e, &mut |sub| {
            (sub == &expr!(add a b) || sub == &e).then(|| "t".to_string())
        });
        assert_eq!(printed, "t*t");
    }

    #[test]
    fn string_escaping() {
        assert_eq!(CppPrinter.escape_string(r#"say "hi"\n"#), r#"say \"hi\"\\n"#);
    }
}
