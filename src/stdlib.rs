// SPDX: CC0-1.0

use crate::{
    eval::{Ident, Idents},
    Number,
};
use core::f64::consts;
use std::collections::HashMap; // assumes Number = f64

pub const X: &str = "x";

/// Builtin unary functions. `log` is the natural logarithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Log,
    Abs,
    Sqrt,
}

impl Builtin {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
        }
    }

    pub fn call(&self, x: Number) -> Number {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Abs => x.abs(),
            Self::Sqrt => x.sqrt(),
        }
    }
}

pub fn standard_idents() -> Idents {
    let mut ret = HashMap::new();

    ret.insert(X.into(), Ident::Var);

    ret.insert("pi".into(), Ident::Const(consts::PI));
    ret.insert("π".into(), Ident::Const(consts::PI));
    ret.insert("tau".into(), Ident::Const(consts::TAU));
    ret.insert("e".into(), Ident::Const(consts::E));

    for fun in [
        Builtin::Sin,
        Builtin::Cos,
        Builtin::Tan,
        Builtin::Asin,
        Builtin::Acos,
        Builtin::Atan,
        Builtin::Exp,
        Builtin::Log,
        Builtin::Abs,
        Builtin::Sqrt,
    ] {
        ret.insert(fun.name().into(), Ident::Fun(fun));
    }

    // alternate spellings
    ret.insert("ln".into(), Ident::Fun(Builtin::Log));
    ret.insert("arcsin".into(), Ident::Fun(Builtin::Asin));
    ret.insert("arccos".into(), Ident::Fun(Builtin::Acos));
    ret.insert("arctan".into(), Ident::Fun(Builtin::Atan));

    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn log_is_natural() {
        assert_abs_diff_eq!(Builtin::Log.call(consts::E), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn aliases_resolve_to_the_same_builtin() {
        let idents = standard_idents();
        match (idents.get(&"ln".into()), idents.get(&"log".into())) {
            (Some(Ident::Fun(a)), Some(Ident::Fun(b))) => assert_eq!(a, b),
            other => panic!("unexpected table entries: {other:?}"),
        }
    }

    #[test]
    fn pi_glyph_and_name_agree() {
        let idents = standard_idents();
        match (idents.get(&"π".into()), idents.get(&"pi".into())) {
            (Some(Ident::Const(a)), Some(Ident::Const(b))) => assert_eq!(a, b),
            other => panic!("unexpected table entries: {other:?}"),
        }
    }
}
