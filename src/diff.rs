// SPDX: CC0-1.0

//! Derivatives of compiled expressions. The symbolic pass handles the usual
//! rule set; anything it cannot express (ternaries, comparisons) falls back
//! to a central difference over the original function.

use crate::{
    eval::{BinOp, Compiled, Expr},
    stdlib::Builtin,
    Number,
};

/// Relative step for the numeric fallback, scaled with |x| to keep rounding
/// error under control away from the origin.
pub const DIFF_STEP: Number = 1e-5;

#[derive(Clone, Debug)]
pub enum Derivative {
    /// An exact derivative expression, compiled like any other.
    Symbolic(Compiled),
    /// No symbolic form; holds the original function and differentiates it
    /// numerically on every call.
    Numeric(Compiled),
}

impl Derivative {
    pub fn of(f: &Compiled) -> Self {
        match d_dx(f.ast()) {
            Some(ast) => Self::Symbolic(Compiled::from(ast)),
            None => Self::Numeric(f.clone()),
        }
    }

    pub fn call(&self, x: Number) -> Number {
        match self {
            Self::Symbolic(df) => df.call(x),
            Self::Numeric(f) => central_difference(f, x),
        }
    }

    pub const fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }

    pub fn symbolic_ast(&self) -> Option<&Expr> {
        match self {
            Self::Symbolic(df) => Some(df.ast()),
            Self::Numeric(_) => None,
        }
    }
}

/// `(f(x+h) - f(x-h)) / 2h` with `h = DIFF_STEP * max(1, |x|)`. Exact to
/// second order for smooth f; garbage near kinks, like any finite difference.
pub fn central_difference(f: &Compiled, x: Number) -> Number {
    let h = DIFF_STEP * x.abs().max(1.0);
    let d = (f.call(x + h) - f.call(x - h)) / (2.0 * h);
    if d.is_finite() {
        d
    } else {
        Number::NAN
    }
}

fn val(v: Number) -> Expr {
    Expr::Val(v)
}

fn neg(a: Expr) -> Expr {
    Expr::Neg(Box::new(a))
}

fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary(op, Box::new(l), Box::new(r))
}

fn add(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Add, l, r)
}

fn sub(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Sub, l, r)
}

fn mul(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Mul, l, r)
}

fn div(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Div, l, r)
}

fn pow(l: Expr, r: Expr) -> Expr {
    bin(BinOp::Pow, l, r)
}

fn call(fun: Builtin, arg: Expr) -> Expr {
    Expr::Call(fun, Box::new(arg))
}

fn depends_on_x(expr: &Expr) -> bool {
    match expr {
        Expr::Val(_) => false,
        Expr::Var => true,
        Expr::Neg(a) | Expr::Call(_, a) => depends_on_x(a),
        Expr::Binary(_, l, r) => depends_on_x(l) || depends_on_x(r),
        Expr::Cond(c, t, e) => depends_on_x(c) || depends_on_x(t) || depends_on_x(e),
    }
}

/// Structural differentiation with respect to x. Returns `None` where no
/// rule applies, which sends the caller to the numeric fallback.
fn d_dx(expr: &Expr) -> Option<Expr> {
    // constant rule, regardless of shape
    if !depends_on_x(expr) {
        return Some(val(0.0));
    }

    match expr {
        Expr::Val(_) => Some(val(0.0)),
        Expr::Var => Some(val(1.0)),

        Expr::Neg(a) => Some(neg(d_dx(a)?)),

        Expr::Binary(op, l, r) => {
            let (u, v) = (l.as_ref(), r.as_ref());
            match op {
                BinOp::Add => Some(add(d_dx(u)?, d_dx(v)?)),
                BinOp::Sub => Some(sub(d_dx(u)?, d_dx(v)?)),
                // (uv)' = u'v + uv'
                BinOp::Mul => {
                    let du = d_dx(u)?;
                    let dv = d_dx(v)?;
                    Some(add(mul(du, v.clone()), mul(u.clone(), dv)))
                }
                // (u/v)' = (u'v - uv') / v^2
                BinOp::Div => {
                    let du = d_dx(u)?;
                    let dv = d_dx(v)?;
                    let num = sub(mul(du, v.clone()), mul(u.clone(), dv));
                    Some(div(num, pow(v.clone(), val(2.0))))
                }
                BinOp::Pow => d_pow(expr, u, v),
                // comparisons have no derivative expression; they only show
                // up inside piecewise definitions, which take the fallback
                BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => None,
            }
        }

        Expr::Call(fun, arg) => {
            let u = arg.as_ref();
            let du = d_dx(u)?;
            let outer = match fun {
                // cos(u)
                Builtin::Sin => call(Builtin::Cos, u.clone()),
                // -sin(u)
                Builtin::Cos => neg(call(Builtin::Sin, u.clone())),
                // 1 / cos(u)^2
                Builtin::Tan => div(val(1.0), pow(call(Builtin::Cos, u.clone()), val(2.0))),
                // 1 / sqrt(1 - u^2)
                Builtin::Asin => div(val(1.0), call(Builtin::Sqrt, sub(val(1.0), pow(u.clone(), val(2.0))))),
                // -1 / sqrt(1 - u^2)
                Builtin::Acos => neg(div(
                    val(1.0),
                    call(Builtin::Sqrt, sub(val(1.0), pow(u.clone(), val(2.0)))),
                )),
                // 1 / (1 + u^2)
                Builtin::Atan => div(val(1.0), add(val(1.0), pow(u.clone(), val(2.0)))),
                // exp(u)
                Builtin::Exp => call(Builtin::Exp, u.clone()),
                // 1 / u
                Builtin::Log => div(val(1.0), u.clone()),
                // u / abs(u): the sign of u, undefined (NaN) at u = 0
                Builtin::Abs => div(u.clone(), call(Builtin::Abs, u.clone())),
                // 1 / (2 sqrt(u))
                Builtin::Sqrt => div(val(1.0), mul(val(2.0), call(Builtin::Sqrt, u.clone()))),
            };
            Some(mul(outer, du))
        }

        Expr::Cond(..) => None,
    }
}

/// The three power-rule cases for `u ^ v`.
fn d_pow(whole: &Expr, u: &Expr, v: &Expr) -> Option<Expr> {
    let du = d_dx(u)?;
    let dv = d_dx(v)?;

    if !depends_on_x(v) {
        // constant exponent: v * u^(v-1) * u'
        let shifted = pow(u.clone(), sub(v.clone(), val(1.0)));
        Some(mul(mul(v.clone(), shifted), du))
    } else if !depends_on_x(u) {
        // constant base: u^v * log(u) * v'
        Some(mul(mul(whole.clone(), call(Builtin::Log, u.clone())), dv))
    } else {
        // general case: u^v * (v' log(u) + v u' / u)
        let inner = add(
            mul(dv, call(Builtin::Log, u.clone())),
            div(mul(v.clone(), du), u.clone()),
        );
        Some(mul(whole.clone(), inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib;
    use approx::assert_abs_diff_eq;

    fn derivative_of(input: &str) -> (Compiled, Derivative) {
        let f = Compiled::compile(input, &stdlib::standard_idents()).expect("compiles");
        let df = Derivative::of(&f);
        (f, df)
    }

    #[test]
    fn power_rule() {
        let (_, df) = derivative_of("x^2");
        assert!(df.is_symbolic());
        assert_abs_diff_eq!(df.call(3.0), 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(df.call(-1.5), -3.0, epsilon = 1e-6);
    }

    #[test]
    fn chain_rule_through_builtins() {
        let (_, df) = derivative_of("sin(x)");
        assert!(df.is_symbolic());
        assert_abs_diff_eq!(df.call(0.0), 1.0, epsilon = 1e-6);

        let (_, df) = derivative_of("sin(x^2)");
        // d/dx sin(x^2) = 2x cos(x^2)
        let x: Number = 1.3;
        assert_abs_diff_eq!(df.call(x), 2.0 * x * (x * x).cos(), epsilon = 1e-9);
    }

    #[test]
    fn product_and_quotient_rules() {
        let (_, df) = derivative_of("x * sin(x)");
        let x: Number = 0.7;
        assert_abs_diff_eq!(df.call(x), x.sin() + x * x.cos(), epsilon = 1e-9);

        let (_, df) = derivative_of("sin(x) / x");
        let expected = (x * x.cos() - x.sin()) / (x * x);
        assert_abs_diff_eq!(df.call(x), expected, epsilon = 1e-9);
    }

    #[test]
    fn exponential_cases() {
        // constant base
        let (_, df) = derivative_of("2^x");
        let x: Number = 1.5;
        assert_abs_diff_eq!(df.call(x), 2f64.powf(x) * 2f64.ln(), epsilon = 1e-9);

        // general u^v
        let (_, df) = derivative_of("x^x");
        let expected = x.powf(x) * (x.ln() + 1.0);
        assert_abs_diff_eq!(df.call(x), expected, epsilon = 1e-9);
    }

    #[test]
    fn abs_derivative_is_sign_with_a_hole() {
        let (_, df) = derivative_of("abs(x)");
        assert!(df.is_symbolic());
        assert_abs_diff_eq!(df.call(2.0), 1.0);
        assert_abs_diff_eq!(df.call(-2.0), -1.0);
        assert!(df.call(0.0).is_nan());
    }

    #[test]
    fn log_derivative_stays_out_of_domain() {
        let (_, df) = derivative_of("log(x)");
        assert_abs_diff_eq!(df.call(2.0), 0.5, epsilon = 1e-12);
        // 1/x is finite at negative x, but the plot never gets there
        // because f itself is NaN; the derivative alone is still 1/x
        assert_abs_diff_eq!(df.call(-2.0), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn ternary_falls_back_to_numeric() {
        let (_, df) = derivative_of("x < 0 ? -1 : 1");
        assert!(!df.is_symbolic());
        // flat on both sides of the step
        assert_abs_diff_eq!(df.call(1.0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(df.call(-1.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn numeric_fallback_accuracy() {
        let f = Compiled::compile("exp(x)", &stdlib::standard_idents()).unwrap();
        for x in [-2.0, 0.0, 1.0, 5.0] {
            assert_abs_diff_eq!(
                central_difference(&f, x),
                f.call(x),
                epsilon = 1e-5 * f.call(x).abs().max(1.0)
            );
        }
    }

    #[test]
    fn constant_rule_short_circuits() {
        let (_, df) = derivative_of("pi * tau");
        assert!(df.is_symbolic());
        assert_abs_diff_eq!(df.call(123.0), 0.0);
    }

    #[test]
    fn derivative_never_panics() {
        for input in ["log(x)", "sqrt(x)", "1/x", "tan(x)", "x^0.5"] {
            let (_, df) = derivative_of(input);
            for i in -20..=20 {
                let x = i as Number * 0.5;
                let y = df.call(x);
                assert!(y.is_finite() || y.is_nan());
            }
        }
    }
}
