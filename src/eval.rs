// SPDX: CC0-1.0

use crate::{
    lex::{Lexer, SubStr},
    parse::{self, ParseErr},
    stdlib::Builtin,
    Number,
};
use core::fmt;
use std::{collections::HashMap, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorTyp {
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
}

impl OperatorTyp {
    pub const fn precedence(&self) -> i8 {
        match self {
            Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Eq | Self::Ne => 1,
            Self::Add => 2,
            Self::Sub => 2,
            Self::Mul => 3,
            Self::Div => 3,
            Self::Neg => 4,
            Self::Pow => 5,
        }
    }

    pub const fn associativity(&self) -> Associativity {
        use Associativity::{Left, Right};
        match self {
            Self::Neg => Left,
            Self::Add => Left,
            Self::Sub => Left,
            Self::Mul => Left,
            Self::Div => Left,
            Self::Pow => Right,
            Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Eq | Self::Ne => Left,
        }
    }

    /// The binary node kind this operator folds into; `None` for unary minus.
    pub const fn binop(&self) -> Option<BinOp> {
        match self {
            Self::Neg => None,
            Self::Add => Some(BinOp::Add),
            Self::Sub => Some(BinOp::Sub),
            Self::Mul => Some(BinOp::Mul),
            Self::Div => Some(BinOp::Div),
            Self::Pow => Some(BinOp::Pow),
            Self::Lt => Some(BinOp::Lt),
            Self::Gt => Some(BinOp::Gt),
            Self::Le => Some(BinOp::Le),
            Self::Ge => Some(BinOp::Ge),
            Self::Eq => Some(BinOp::Eq),
            Self::Ne => Some(BinOp::Ne),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub const fn precedence(&self) -> i8 {
        match self {
            Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Eq | Self::Ne => 1,
            Self::Add | Self::Sub => 2,
            Self::Mul | Self::Div => 3,
            Self::Pow => 5,
        }
    }

    /// Comparisons follow the usual numeric convention of 1.0 for true and
    /// 0.0 for false; any comparison against NaN is false.
    pub fn apply(&self, l: Number, r: Number) -> Number {
        fn truth(cond: bool) -> Number {
            if cond {
                1.0
            } else {
                0.0
            }
        }
        match self {
            Self::Add => l + r,
            Self::Sub => l - r,
            Self::Mul => l * r,
            Self::Div => l / r,
            Self::Pow => l.powf(r),
            Self::Lt => truth(l < r),
            Self::Gt => truth(l > r),
            Self::Le => truth(l <= r),
            Self::Ge => truth(l >= r),
            Self::Eq => truth(l == r),
            Self::Ne => truth(l != r),
        }
    }
}

/// Expression tree over a single free variable `x`. Constants are folded at
/// parse time, so evaluation needs nothing but the tree and an x value.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Val(Number),
    Var,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn precedence(&self) -> i8 {
        match self {
            Self::Val(v) => {
                if *v < 0.0 {
                    OperatorTyp::Neg.precedence()
                } else {
                    i8::MAX
                }
            }
            Self::Var | Self::Call(..) => i8::MAX,
            Self::Neg(_) => OperatorTyp::Neg.precedence(),
            Self::Binary(op, ..) => op.precedence(),
            Self::Cond(..) => 0,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parent: i8, tight: bool) -> fmt::Result {
        let parens = self.precedence() < parent || (tight && self.precedence() == parent);
        if parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Val(v) => write!(f, "{v}"),
            Self::Var => f.write_str("x"),
            Self::Neg(a) => {
                f.write_str("-")?;
                a.fmt_child(f, self.precedence(), true)
            }
            Self::Binary(op, l, r) => {
                let prec = op.precedence();
                // the right operand of a left-associative operator (and the
                // left of a right-associative one) re-parenthesizes at equal
                // precedence, so `a - (b - c)` survives a round trip
                let right_tight = *op != BinOp::Pow;
                l.fmt_child(f, prec, !right_tight)?;
                write!(f, " {} ", op.symbol())?;
                r.fmt_child(f, prec, right_tight)
            }
            Self::Call(fun, arg) => write!(f, "{}({arg})", fun.name()),
            Self::Cond(cond, then, els) => {
                cond.fmt_child(f, 1, false)?;
                f.write_str(" ? ")?;
                write!(f, "{then}")?;
                f.write_str(" : ")?;
                write!(f, "{els}")
            }
        }
    }
}

/// Walk the tree with `x` bound. Total: every arm is a closed f64 operation,
/// so the worst outcome is a non-finite value, never a panic. The condition
/// of a ternary is truthy when it is neither zero nor NaN; only the taken
/// branch is evaluated.
pub fn eval(expr: &Expr, x: Number) -> Number {
    match expr {
        Expr::Val(v) => *v,
        Expr::Var => x,
        Expr::Neg(a) => -eval(a, x),
        Expr::Binary(op, l, r) => op.apply(eval(l, x), eval(r, x)),
        Expr::Call(fun, arg) => fun.call(eval(arg, x)),
        Expr::Cond(cond, then, els) => {
            let c = eval(cond, x);
            if c != 0.0 && !c.is_nan() {
                eval(then, x)
            } else {
                eval(els, x)
            }
        }
    }
}

/// A compiled expression: pure, reentrant, and total. Out-of-domain inputs
/// and blowups come back as NaN instead of surfacing as errors.
#[derive(Clone, Debug, PartialEq)]
pub struct Compiled {
    ast: Expr,
}

impl Compiled {
    /// Normalize, lex, and parse `input` into a callable function of x.
    pub fn compile(input: &str, idents: &Idents) -> Result<Self, ParseErr> {
        let src = Arc::new(crate::lex::normalize(input));
        let ast = parse::parse(Lexer::new(&src), idents)?;
        Ok(Self { ast })
    }

    pub fn call(&self, x: Number) -> Number {
        let y = eval(&self.ast, x);
        if y.is_finite() {
            y
        } else {
            Number::NAN
        }
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }
}

impl From<Expr> for Compiled {
    fn from(ast: Expr) -> Self {
        Self { ast }
    }
}

#[derive(Debug)]
pub enum Ident {
    /// The plot variable.
    Var,
    Const(Number),
    Fun(Builtin),
}

#[derive(Clone, Debug, Eq)]
pub enum IdentKey {
    Arc(SubStr),
    Static(&'static str),
}

impl PartialEq for IdentKey {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl core::hash::Hash for IdentKey {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.get().hash(state)
    }
}

impl IdentKey {
    pub fn get(&self) -> &str {
        match self {
            Self::Arc(s) => s.get(),
            Self::Static(s) => s,
        }
    }
}

impl fmt::Display for IdentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arc(s) => write!(f, "{s}"),
            Self::Static(s) => write!(f, "{s}"),
        }
    }
}

impl From<SubStr> for IdentKey {
    fn from(s: SubStr) -> Self {
        Self::Arc(s)
    }
}

impl From<&'static str> for IdentKey {
    fn from(s: &'static str) -> Self {
        Self::Static(s)
    }
}

pub type Idents = HashMap<IdentKey, Ident>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib;
    use approx::assert_abs_diff_eq;

    fn compiled(input: &str) -> Compiled {
        Compiled::compile(input, &stdlib::standard_idents()).expect("compiles")
    }

    #[test]
    fn arithmetic_and_precedence() {
        let f = compiled("1 + 2 * 3 ^ 2");
        assert_abs_diff_eq!(f.call(0.0), 19.0);
        let g = compiled("(1 + 2) * 3");
        assert_abs_diff_eq!(g.call(0.0), 9.0);
    }

    #[test]
    fn pow_is_right_associative() {
        let f = compiled("2 ^ 3 ^ 2");
        assert_abs_diff_eq!(f.call(0.0), 512.0);
    }

    #[test]
    fn unary_minus_binds_below_pow() {
        let f = compiled("-x^2");
        assert_abs_diff_eq!(f.call(3.0), -9.0);
        let g = compiled("2^-x");
        assert_abs_diff_eq!(g.call(1.0), 0.5);
    }

    #[test]
    fn constants_fold() {
        let f = compiled("sin(pi / 2)");
        assert_abs_diff_eq!(f.call(0.0), 1.0, epsilon = 1e-12);
        let g = compiled("π / pi");
        assert_abs_diff_eq!(g.call(0.0), 1.0);
    }

    #[test]
    fn out_of_domain_is_nan_not_a_panic() {
        for (input, x) in [
            ("log(x)", -1.0),
            ("log(x)", 0.0),
            ("sqrt(x)", -4.0),
            ("1 / x", 0.0),
            ("x ^ x", -0.5),
            ("tan(x) / tan(x)", 0.0),
        ] {
            let f = compiled(input);
            let y = f.call(x);
            assert!(y.is_nan(), "{input} at {x} gave {y}");
        }
    }

    #[test]
    fn results_are_deterministic() {
        let f = compiled("sin(x) + x^2/5");
        for i in 0..10 {
            let x = i as Number * 0.7 - 3.0;
            assert_eq!(f.call(x).to_bits(), f.call(x).to_bits());
        }
    }

    #[test]
    fn ternary_selects_branch() {
        let f = compiled("x < 0 ? -1 : 1");
        assert_abs_diff_eq!(f.call(-2.0), -1.0);
        assert_abs_diff_eq!(f.call(2.0), 1.0);
        assert_abs_diff_eq!(f.call(0.0), 1.0);
    }

    #[test]
    fn ternary_is_right_associative() {
        let f = compiled("x < 0 ? -1 : x == 0 ? 0 : 1");
        assert_abs_diff_eq!(f.call(-5.0), -1.0);
        assert_abs_diff_eq!(f.call(0.0), 0.0);
        assert_abs_diff_eq!(f.call(5.0), 1.0);
    }

    #[test]
    fn nan_condition_takes_else_branch() {
        let f = compiled("log(x) < 0 ? 1 : 2");
        // log(-1) is NaN, NaN < 0 is false
        assert_abs_diff_eq!(f.call(-1.0), 2.0);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let f = compiled("(x > 1) + (x >= 1) + (x == 1)");
        assert_abs_diff_eq!(f.call(1.0), 2.0);
        assert_abs_diff_eq!(f.call(2.0), 2.0);
        assert_abs_diff_eq!(f.call(0.0), 0.0);
    }

    #[test]
    fn bar_notation_compiles_to_abs() {
        let f = compiled("|x - 2|");
        assert_abs_diff_eq!(f.call(0.0), 2.0);
        assert_abs_diff_eq!(f.call(5.0), 3.0);
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        let idents = stdlib::standard_idents();
        for input in [
            "x ^ 2 - 3 * x + 1",
            "sin(x) * cos(x)",
            "1 - (2 - x)",
            "2 ^ (x ^ 2)",
            "(x + 1) / (x - 1)",
            "x < 0 ? -x : sqrt(x)",
        ] {
            let f = Compiled::compile(input, &idents).expect("compiles");
            let shown = f.ast().to_string();
            let g = Compiled::compile(&shown, &idents)
                .unwrap_or_else(|_| panic!("display of {input:?} reparses: {shown:?}"));
            for i in 0..7 {
                let x = i as Number * 0.9 + 0.1;
                let (a, b) = (f.call(x), g.call(x));
                assert!(
                    (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-12,
                    "{input} vs {shown} at {x}: {a} vs {b}"
                );
            }
        }
    }
}
