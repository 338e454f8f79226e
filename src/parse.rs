// SPDX: CC0-1.0

// implementation of shunting yard algorithm by dijkstra (see https://en.wikipedia.org/wiki/Shunting_yard_algorithm),
// folding the output stack into an expression tree as operators pop

use crate::{
    eval::{Associativity, Expr, Ident, Idents, OperatorTyp},
    lex::{LexErr, LexErrTyp, Lexer, SubStr, TokTyp},
    stdlib::Builtin,
    Number,
};
use core::{fmt, num::ParseFloatError};

#[derive(Debug)]
pub enum ParseErrTyp {
    LexErr(LexErrTyp),
    ParseNum(ParseFloatError),
    ParenMismatch,
    Empty,
    /// An operator or function popped with too few operands, e.g. `x +`.
    MissingOperand,
    /// More than one value left once everything folded, e.g. `5x`.
    TrailingOperand,
    UndefinedIdent {
        text: SubStr,
    },
    /// `:` with no matching `?`.
    MisplacedColon,
    /// `?` that never met its `:`.
    UnfinishedTernary,
}

impl fmt::Display for ParseErrTyp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LexErr(err) => write!(f, "{err}"),
            Self::ParseNum(err) => write!(f, "invalid number: {err}"),
            Self::ParenMismatch => write!(f, "mismatched parentheses"),
            Self::Empty => write!(f, "cannot parse an empty expression"),
            Self::MissingOperand => write!(f, "operator is missing an operand"),
            Self::TrailingOperand => write!(f, "expected exactly one value"),
            Self::UndefinedIdent { text } => {
                write!(f, "undefined identifier '{}'", text.get())
            }
            Self::MisplacedColon => write!(f, "':' without a matching '?'"),
            Self::UnfinishedTernary => write!(f, "'?' without a matching ':'"),
        }
    }
}

#[derive(Debug)]
pub struct ParseErr {
    pub typ: ParseErrTyp,
    pub loc: SubStr,
}

impl From<LexErr> for ParseErr {
    fn from(err: LexErr) -> Self {
        Self {
            typ: ParseErrTyp::LexErr(err.typ),
            loc: err.loc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShuntOpTyp {
    Operator(OperatorTyp),
    Fun(Builtin),
    OpenParen,
    /// `?` seen, waiting for its `:`.
    Question,
    /// `:` seen, waiting to fold three operands.
    Ternary,
}

#[derive(Clone, Debug)]
struct ShuntOp {
    typ: ShuntOpTyp,
    loc: SubStr,
}

/// Pop the operands an operator needs off the output stack and push the
/// folded node back. Parentheses and pending `?` never reach this point.
fn fold(out: &mut Vec<Expr>, op: ShuntOp) -> Result<(), ParseErr> {
    fn pop(out: &mut Vec<Expr>, loc: &SubStr) -> Result<Expr, ParseErr> {
        out.pop().ok_or_else(|| ParseErr {
            typ: ParseErrTyp::MissingOperand,
            loc: loc.clone(),
        })
    }

    let folded = match op.typ {
        ShuntOpTyp::Operator(OperatorTyp::Neg) => {
            let arg = pop(out, &op.loc)?;
            Expr::Neg(Box::new(arg))
        }
        ShuntOpTyp::Operator(typ) => {
            let binop = typ.binop().expect("only Neg is unary");
            let r = pop(out, &op.loc)?;
            let l = pop(out, &op.loc)?;
            Expr::Binary(binop, Box::new(l), Box::new(r))
        }
        ShuntOpTyp::Fun(fun) => {
            let arg = pop(out, &op.loc)?;
            Expr::Call(fun, Box::new(arg))
        }
        ShuntOpTyp::Ternary => {
            let els = pop(out, &op.loc)?;
            let then = pop(out, &op.loc)?;
            let cond = pop(out, &op.loc)?;
            Expr::Cond(Box::new(cond), Box::new(then), Box::new(els))
        }
        ShuntOpTyp::OpenParen | ShuntOpTyp::Question => {
            unreachable!("parentheses and pending '?' are not foldable")
        }
    };
    out.push(folded);
    Ok(())
}

pub fn parse(lex: Lexer<'_>, idents: &Idents) -> Result<Expr, ParseErr> {
    let whole = SubStr::all(lex.src());
    let mut out: Vec<Expr> = Vec::new(); // output
    let mut ops: Vec<ShuntOp> = Vec::new(); // operator stack

    for tok in lex {
        let tok = tok?;
        match tok.typ {
            TokTyp::Number => {
                let num: Number = match tok.loc.get().parse() {
                    Ok(val) => val,
                    Err(err) => {
                        return Err(ParseErr {
                            typ: ParseErrTyp::ParseNum(err),
                            loc: tok.loc,
                        })
                    }
                };
                out.push(Expr::Val(num));
            }

            TokTyp::Ident => match idents.get(&tok.loc.clone().into()) {
                Some(Ident::Var) => out.push(Expr::Var),
                Some(Ident::Const(val)) => out.push(Expr::Val(*val)),
                Some(Ident::Fun(fun)) => ops.push(ShuntOp {
                    typ: ShuntOpTyp::Fun(*fun),
                    loc: tok.loc,
                }),
                None => {
                    return Err(ParseErr {
                        typ: ParseErrTyp::UndefinedIdent {
                            text: tok.loc.clone(),
                        },
                        loc: tok.loc,
                    })
                }
            },

            TokTyp::Op(o1) if o1 == OperatorTyp::Neg => {
                // prefix operator: nothing on the stack is complete yet, so
                // there is nothing to fold before it
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::Operator(o1),
                    loc: tok.loc,
                });
            }

            TokTyp::Op(o1) => {
                while let Some(o2) = ops.last() {
                    let fold_first = match o2.typ {
                        ShuntOpTyp::OpenParen | ShuntOpTyp::Question | ShuntOpTyp::Ternary => {
                            false
                        }
                        // function application binds tighter than any operator
                        ShuntOpTyp::Fun(_) => true,
                        ShuntOpTyp::Operator(o2) => {
                            o2.precedence() > o1.precedence()
                                || (o1.precedence() == o2.precedence()
                                    && o1.associativity() == Associativity::Left)
                        }
                    };
                    if fold_first {
                        let op = ops.pop().unwrap();
                        fold(&mut out, op)?;
                    } else {
                        break;
                    }
                }
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::Operator(o1),
                    loc: tok.loc,
                });
            }

            TokTyp::Question => {
                // everything else binds tighter than `?:`, and a marker (or
                // another pending ternary) below keeps it right-associative
                while let Some(op) = ops.last() {
                    match op.typ {
                        ShuntOpTyp::Operator(_) | ShuntOpTyp::Fun(_) => {
                            let op = ops.pop().unwrap();
                            fold(&mut out, op)?;
                        }
                        _ => break,
                    }
                }
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::Question,
                    loc: tok.loc,
                });
            }

            TokTyp::Colon => loop {
                match ops.last() {
                    Some(op) if op.typ == ShuntOpTyp::Question => {
                        let question = ops.pop().unwrap();
                        ops.push(ShuntOp {
                            typ: ShuntOpTyp::Ternary,
                            loc: question.loc,
                        });
                        break;
                    }
                    Some(op) if op.typ == ShuntOpTyp::OpenParen => {
                        return Err(ParseErr {
                            typ: ParseErrTyp::MisplacedColon,
                            loc: tok.loc,
                        })
                    }
                    Some(_) => {
                        let op = ops.pop().unwrap();
                        fold(&mut out, op)?;
                    }
                    None => {
                        return Err(ParseErr {
                            typ: ParseErrTyp::MisplacedColon,
                            loc: tok.loc,
                        })
                    }
                }
            },

            TokTyp::Comma => {
                while let Some(op) = ops.last() {
                    match op.typ {
                        ShuntOpTyp::OpenParen => break,
                        ShuntOpTyp::Question => {
                            return Err(ParseErr {
                                typ: ParseErrTyp::UnfinishedTernary,
                                loc: op.loc.clone(),
                            })
                        }
                        _ => {
                            let op = ops.pop().unwrap();
                            fold(&mut out, op)?;
                        }
                    }
                }
            }

            TokTyp::OpenParen => {
                ops.push(ShuntOp {
                    typ: ShuntOpTyp::OpenParen,
                    loc: tok.loc,
                });
            }

            TokTyp::CloseParen => {
                loop {
                    match ops.last() {
                        Some(op) if op.typ == ShuntOpTyp::OpenParen => break,
                        Some(op) if op.typ == ShuntOpTyp::Question => {
                            return Err(ParseErr {
                                typ: ParseErrTyp::UnfinishedTernary,
                                loc: op.loc.clone(),
                            })
                        }
                        Some(_) => {
                            let op = ops.pop().unwrap();
                            fold(&mut out, op)?;
                        }
                        None => {
                            return Err(ParseErr {
                                typ: ParseErrTyp::ParenMismatch,
                                loc: tok.loc,
                            })
                        }
                    }
                }
                ops.pop().unwrap(); // the open paren

                // fold `sin(...)` now that its argument is complete
                if let Some(op) = ops.last() {
                    if matches!(op.typ, ShuntOpTyp::Fun(_)) {
                        let op = ops.pop().unwrap();
                        fold(&mut out, op)?;
                    }
                }
            }

            TokTyp::XAssign
            | TokTyp::XPipe
            | TokTyp::XOpenSquareBracket
            | TokTyp::XCloseSquareBracket
            | TokTyp::XOpenCurly
            | TokTyp::XCloseCurly => unreachable!("unsupported token survived until parsing"),
        }
    }

    while let Some(op) = ops.pop() {
        match op.typ {
            ShuntOpTyp::OpenParen => {
                return Err(ParseErr {
                    typ: ParseErrTyp::ParenMismatch,
                    loc: op.loc,
                })
            }
            ShuntOpTyp::Question => {
                return Err(ParseErr {
                    typ: ParseErrTyp::UnfinishedTernary,
                    loc: op.loc,
                })
            }
            _ => fold(&mut out, op)?,
        }
    }

    match out.len() {
        0 => Err(ParseErr {
            typ: ParseErrTyp::Empty,
            loc: whole,
        }),
        1 => Ok(out.pop().unwrap()),
        _ => Err(ParseErr {
            typ: ParseErrTyp::TrailingOperand,
            loc: whole,
        }),
    }
}
