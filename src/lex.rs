// SPDX: CC0-1.0

use crate::eval::OperatorTyp;
use core::{fmt, iter::Peekable, str::CharIndices};
use std::sync::Arc;

/// Byte-indexed slice of a shared source string. Tokens and errors carry one
/// of these so diagnostics can underline the offending characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubStr {
    // yes, silly, but atomic operations are cheap for this use case
    src: Arc<String>,
    start: usize,
    len: usize,
}

impl SubStr {
    #[inline]
    pub const fn new(src: Arc<String>, start: usize, len: usize) -> Self {
        Self { src, start, len }
    }

    #[inline]
    pub fn all(src: Arc<String>) -> Self {
        let len = src.len();
        Self::new(src, 0, len)
    }

    pub fn src(&self) -> Arc<String> {
        Arc::clone(&self.src)
    }

    pub const fn start(&self) -> usize {
        self.start
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self) -> &str {
        &self.src[self.start..self.start + self.len]
    }

    pub fn shift_right(&mut self, by: usize) {
        self.len += by;
    }
}

impl fmt::Display for SubStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.get())
    }
}

/// Pre-lex cleanup of raw input: trims whitespace, and rewrites a single
/// outermost absolute-value bar pair `|...|` into `abs(...)`. The rewrite
/// only fires when the whole (trimmed) input is one bar pair, the interior
/// has no further bar, and no `abs(` call is already present. Anything else
/// is left for the lexer to reject with a pointed note.
pub fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.contains("abs(") {
        if let Some(inner) = trimmed
            .strip_prefix('|')
            .and_then(|rest| rest.strip_suffix('|'))
        {
            if !inner.is_empty() && !inner.contains('|') {
                return format!("abs({inner})");
            }
        }
    }
    trimmed.to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokTyp {
    Ident,
    Number,
    Op(OperatorTyp),
    Comma,
    OpenParen,
    CloseParen,
    Question,
    Colon,

    // unsupported tokens
    XAssign,
    XPipe,
    XOpenSquareBracket,
    XCloseSquareBracket,
    XOpenCurly,
    XCloseCurly,
}

impl TokTyp {
    pub const fn is_unsupported(&self) -> bool {
        match self {
            Self::Ident
            | Self::Number
            | Self::Op(_)
            | Self::Comma
            | Self::OpenParen
            | Self::CloseParen
            | Self::Question
            | Self::Colon => false,

            // unsupported tokens
            Self::XAssign
            | Self::XPipe
            | Self::XOpenSquareBracket
            | Self::XCloseSquareBracket
            | Self::XOpenCurly
            | Self::XCloseCurly => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tok {
    pub typ: TokTyp,
    pub loc: SubStr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LexErrTyp {
    InvalidChar,
    Unsupported(TokTyp),
}

impl fmt::Display for LexErrTyp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChar => write!(f, "invalid character"),
            Self::Unsupported(_) => write!(f, "unsupported character"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LexErr {
    pub typ: LexErrTyp,
    pub loc: SubStr,
}

#[derive(Debug)]
pub struct Lexer<'src> {
    src: &'src Arc<String>,
    cur: Peekable<CharIndices<'src>>,
    // decides whether '-' negates or subtracts
    prev: Option<TokTyp>,
    has_errored: bool, // tells iter to yield None after error
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src Arc<String>) -> Self {
        Self {
            src,
            cur: src.char_indices().peekable(),
            prev: None,
            has_errored: false,
        }
    }

    pub fn src(&self) -> Arc<String> {
        Arc::clone(self.src)
    }

    fn trim_whitespace(&mut self) {
        while let Some((_, chr)) = self.cur.peek() {
            if chr.is_whitespace() {
                self.cur.next();
            } else {
                break;
            }
        }
    }

    /// Tokens that read in one glance: single symbols, and the two-character
    /// comparisons `<= >= == !=`.
    fn consume_symbol(&mut self) -> Option<Result<Tok, LexErr>> {
        let (idx, chr) = self.cur.peek().copied()?;
        let typ = match chr {
            '+' => TokTyp::Op(OperatorTyp::Add),
            '*' => TokTyp::Op(OperatorTyp::Mul),
            '/' => TokTyp::Op(OperatorTyp::Div),
            '^' => TokTyp::Op(OperatorTyp::Pow),
            ',' => TokTyp::Comma,
            '(' => TokTyp::OpenParen,
            ')' => TokTyp::CloseParen,
            '?' => TokTyp::Question,
            ':' => TokTyp::Colon,

            '<' | '>' | '=' | '!' => {
                self.cur.next().unwrap();
                let followed_by_eq = matches!(self.cur.peek(), Some((_, '=')));
                if followed_by_eq {
                    self.cur.next().unwrap();
                }
                let typ = match (chr, followed_by_eq) {
                    ('<', false) => TokTyp::Op(OperatorTyp::Lt),
                    ('<', true) => TokTyp::Op(OperatorTyp::Le),
                    ('>', false) => TokTyp::Op(OperatorTyp::Gt),
                    ('>', true) => TokTyp::Op(OperatorTyp::Ge),
                    ('=', true) => TokTyp::Op(OperatorTyp::Eq),
                    ('!', true) => TokTyp::Op(OperatorTyp::Ne),
                    // '=' alone is an (unsupported) assignment, '!' alone is noise
                    ('=', false) => TokTyp::XAssign,
                    ('!', false) => {
                        return Some(Err(LexErr {
                            typ: LexErrTyp::InvalidChar,
                            loc: SubStr::new(Arc::clone(self.src), idx, 1),
                        }));
                    }
                    _ => unreachable!(),
                };
                let len = if followed_by_eq { 2 } else { 1 };
                return Some(Ok(Tok {
                    typ,
                    loc: SubStr::new(Arc::clone(self.src), idx, len),
                }));
            }

            '-' => {
                // unary when there is nothing yet to subtract from
                let negates = match self.prev {
                    None
                    | Some(TokTyp::Op(_))
                    | Some(TokTyp::Comma)
                    | Some(TokTyp::OpenParen)
                    | Some(TokTyp::Question)
                    | Some(TokTyp::Colon) => true,
                    Some(_) => false,
                };
                if negates {
                    TokTyp::Op(OperatorTyp::Neg)
                } else {
                    TokTyp::Op(OperatorTyp::Sub)
                }
            }

            '|' => TokTyp::XPipe,
            '[' => TokTyp::XOpenSquareBracket,
            ']' => TokTyp::XCloseSquareBracket,
            '{' => TokTyp::XOpenCurly,
            '}' => TokTyp::XCloseCurly,
            _ => return None,
        };
        self.cur.next().unwrap(); // consume because we only peeked
        Some(Ok(Tok {
            typ,
            loc: SubStr::new(Arc::clone(self.src), idx, chr.len_utf8()),
        }))
    }

    /// Gather a maximal run of characters matching `predicate` into one token
    /// starting at `next_idx`. Returns `None` if the run is empty.
    fn consume_by<P>(&mut self, next_idx: usize, typ: TokTyp, predicate: P) -> Option<Tok>
    where
        P: Fn(char) -> bool,
    {
        let mut tok = Tok {
            typ,
            loc: SubStr::new(Arc::clone(self.src), next_idx, 0),
        };
        while let Some((_, chr)) = self.cur.peek().copied() {
            if predicate(chr) {
                tok.loc.shift_right(chr.len_utf8());
                self.cur.next().unwrap();
            } else {
                break;
            }
        }
        if tok.loc.is_empty() {
            None
        } else {
            Some(tok)
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Tok, LexErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_errored {
            return None;
        }

        self.trim_whitespace();

        let (next_idx, next_chr) = self.cur.peek().copied()?;
        let ret = if let Some(sym) = self.consume_symbol() {
            match sym {
                Ok(tok) => Some(Ok(tok)),
                Err(err) => {
                    self.has_errored = true;
                    return Some(Err(err));
                }
            }
        } else if next_chr == 'π' {
            // the glyph is an identifier on its own
            self.cur.next().unwrap();
            Some(Ok(Tok {
                typ: TokTyp::Ident,
                loc: SubStr::new(Arc::clone(self.src), next_idx, 'π'.len_utf8()),
            }))
        } else if let Some(tok) =
            self.consume_by(next_idx, TokTyp::Ident, |chr| chr.is_ascii_alphabetic())
        {
            Some(Ok(tok))
        } else if let Some(tok) = self.consume_by(next_idx, TokTyp::Number, |chr| {
            chr.is_ascii_digit() || chr == '.'
        }) {
            Some(Ok(tok))
        } else {
            self.has_errored = true;
            Some(Err(LexErr {
                typ: LexErrTyp::InvalidChar,
                loc: SubStr::new(Arc::clone(self.src), next_idx, next_chr.len_utf8()),
            }))
        };

        if let Some(Ok(ref tok)) = ret {
            if tok.typ.is_unsupported() {
                self.has_errored = true;
                return Some(Err(LexErr {
                    typ: LexErrTyp::Unsupported(tok.typ),
                    loc: tok.loc.clone(),
                }));
            }
            self.prev = Some(tok.typ);
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_types(input: &str) -> Vec<TokTyp> {
        let src = Arc::new(String::from(input));
        Lexer::new(&src)
            .map(|tok| tok.expect("lexes cleanly").typ)
            .collect()
    }

    #[test]
    fn comparisons_lex_as_one_token() {
        use OperatorTyp::*;
        assert_eq!(
            lex_types("x <= 1"),
            [TokTyp::Ident, TokTyp::Op(Le), TokTyp::Number]
        );
        assert_eq!(
            lex_types("x<1"),
            [TokTyp::Ident, TokTyp::Op(Lt), TokTyp::Number]
        );
        assert_eq!(
            lex_types("x != x"),
            [TokTyp::Ident, TokTyp::Op(Ne), TokTyp::Ident]
        );
        assert_eq!(
            lex_types("x == 0 ? 1 : 2"),
            [
                TokTyp::Ident,
                TokTyp::Op(Eq),
                TokTyp::Number,
                TokTyp::Question,
                TokTyp::Number,
                TokTyp::Colon,
                TokTyp::Number,
            ]
        );
    }

    #[test]
    fn minus_is_contextual() {
        use OperatorTyp::{Mul, Neg, Sub};
        assert_eq!(
            lex_types("x-1"),
            [TokTyp::Ident, TokTyp::Op(Sub), TokTyp::Number]
        );
        assert_eq!(lex_types("-x"), [TokTyp::Op(Neg), TokTyp::Ident]);
        assert_eq!(
            lex_types("2*-x"),
            [TokTyp::Number, TokTyp::Op(Mul), TokTyp::Op(Neg), TokTyp::Ident]
        );
        assert_eq!(
            lex_types("(-x)"),
            [
                TokTyp::OpenParen,
                TokTyp::Op(Neg),
                TokTyp::Ident,
                TokTyp::CloseParen
            ]
        );
    }

    #[test]
    fn pi_glyph_is_an_identifier() {
        let src = Arc::new(String::from("2 * π"));
        let toks: Vec<_> = Lexer::new(&src).map(|tok| tok.unwrap()).collect();
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[2].typ, TokTyp::Ident);
        assert_eq!(toks[2].loc.get(), "π");
    }

    #[test]
    fn single_equals_is_rejected() {
        let src = Arc::new(String::from("x = 1"));
        let err = Lexer::new(&src)
            .find_map(Result::err)
            .expect("lexing should fail");
        assert_eq!(err.typ, LexErrTyp::Unsupported(TokTyp::XAssign));
    }

    #[test]
    fn interior_bar_is_rejected() {
        let src = Arc::new(String::from("1 + |x|"));
        let err = Lexer::new(&src)
            .find_map(Result::err)
            .expect("lexing should fail");
        assert_eq!(err.typ, LexErrTyp::Unsupported(TokTyp::XPipe));
    }

    #[test]
    fn normalize_rewrites_one_outer_bar_pair() {
        assert_eq!(normalize("  |x - 1|  "), "abs(x - 1)");
        assert_eq!(normalize("|x|"), "abs(x)");
        // not an outermost pair
        assert_eq!(normalize("|x| + 1"), "|x| + 1");
        // nested bars are left alone
        assert_eq!(normalize("||x||"), "||x||");
        // already in call form
        assert_eq!(normalize("abs(x)"), "abs(x)");
        assert_eq!(normalize("|abs(x)|"), "|abs(x)|");
        assert_eq!(normalize("||"), "||");
    }
}
