use std::fmt::Display;
use std::ops;

pub type Symbol = symbol_table::GlobalSymbol;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum Literal {
    Int(i64),
}

macro_rules! impl_from {
    ($ctor:ident($t:ty)) => {
        impl From<$t> for Literal {
            fn from(t: $t) -> Self {
                Literal::$ctor(t)
            }
        }
    };
}

impl_from!(Int(i64));

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(i) => Display::fmt(i, f),
        }
    }
}

/// The operator at the head of a compound expression.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum Op {
    Add,
    Mul,
    Neg,
    /// Exactly two children: base and exponent.
    Pow,
    /// A named function, e.g. `sin`.
    Call(Symbol),
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Add => f.write_str("+"),
            Op::Mul => f.write_str("*"),
            Op::Neg => f.write_str("-"),
            Op::Pow => f.write_str("^"),
            Op::Call(name) => Display::fmt(name, f),
        }
    }
}

/// An immutable symbolic expression.
///
/// Expressions are produced by the physics layer and are only ever
/// printed, never evaluated. Equality and hashing are structural.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum Expr {
    Lit(Literal),
    Var(Symbol),
    Node(Op, Vec<Self>),
}

impl Expr {
    pub fn new(op: Op, children: impl IntoIterator<Item = Self>) -> Self {
        Self::Node(op, children.into_iter().collect())
    }

    pub fn var(name: impl Into<Symbol>) -> Self {
        Self::Var(name.into())
    }

    pub fn int(i: i64) -> Self {
        Self::Lit(Literal::Int(i))
    }

    pub fn add(children: impl IntoIterator<Item = Self>) -> Self {
        Self::new(Op::Add, children)
    }

    pub fn mul(children: impl IntoIterator<Item = Self>) -> Self {
        Self::new(Op::Mul, children)
    }

    pub fn pow(base: Self, exponent: Self) -> Self {
        Self::Node(Op::Pow, vec![base, exponent])
    }

    pub fn call(name: impl Into<Symbol>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::new(Op::Call(name.into()), args)
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, Expr::Node(..))
    }

    pub fn children(&self) -> &[Self] {
        match self {
            Expr::Var(_) | Expr::Lit(_) => &[],
            Expr::Node(_, children) => children,
        }
    }

    pub fn walk(&self, pre: &mut impl FnMut(&Self), post: &mut impl FnMut(&Self)) {
        pre(self);
        self.children()
            .iter()
            .for_each(|child| child.walk(pre, post));
        post(self);
    }

    pub fn fold<Out>(&self, f: &mut impl FnMut(&Self, Vec<Out>) -> Out) -> Out {
        let ts = self.children().iter().map(|child| child.fold(f)).collect();
        f(self, ts)
    }

    /// Number of nodes in the tree, leaves included.
    pub fn size(&self) -> usize {
        self.fold(&mut |_, sizes: Vec<usize>| 1 + sizes.iter().sum::<usize>())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Lit(lit) => Display::fmt(lit, f),
            Expr::Var(var) => Display::fmt(var, f),
            Expr::Node(op, args) => {
                write!(f, "({}", op)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        Expr::int(i)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::var(name)
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::add([self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::add([self, -rhs])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::mul([self, rhs])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Node(Op::Neg, vec![self])
    }
}

/// Builds an [`Expr`] from s-expression-like syntax.
///
/// ```
/// use tensorgen::{expr, Expr};
/// let e = expr!(mul (add a b) (add a b));
/// assert_eq!(e, (Expr::var("a") + Expr::var("b")) * (Expr::var("a") + Expr::var("b")));
/// ```
#[macro_export]
macro_rules! expr {
    (( $($inner:tt)* )) => { $crate::expr!($($inner)*) };
    (add $($arg:tt)+) => { $crate::Expr::add([$($crate::expr!($arg)),+]) };
    (mul $($arg:tt)+) => { $crate::Expr::mul([$($crate::expr!($arg)),+]) };
    (neg $arg:tt) => { -$crate::expr!($arg) };
    (pow $base:tt $exp:tt) => { $crate::Expr::pow($crate::expr!($base), $crate::expr!($exp)) };
    ($f:ident $($arg:tt)+) => { $crate::Expr::call(stringify!($f), [$($crate::expr!($arg)),+]) };
    ($sym:ident) => { $crate::Expr::var(stringify!($sym)) };
    ($e:expr) => { $crate::Expr::int($e) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sexp_display() {
        let e = expr!(mul (add a b) (sin (neg c)));
        assert_eq!(e.to_string(), "(* (+ a b) (sin (- c)))");
        assert_eq!(e.size(), 7);
    }

    #[test]
    fn operator_overloads() {
        let a = Expr::var("a");
        let b = Expr::var("b");
        assert_eq!(a.clone() - b.clone(), expr!(add a (neg b)));
        assert_eq!(a * Expr::int(2), expr!(mul a 2));
    }
}
