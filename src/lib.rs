// SPDX: CC0-1.0

pub mod coord;
pub mod diff;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod range;
pub mod render;
pub mod shell;
pub mod stdlib;

use core::{fmt, ops::Range};

pub type Number = f64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    #[inline]
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

/// World-space view of the plot: the x domain shared by both curves and the
/// number of samples drawn across it.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub x: Range<Number>,
    pub samples: usize,
}

impl Viewport {
    /// Finite bounds with `x.start < x.end`. Callers reject input that fails
    /// this before sampling; the mappers fall back to a unit span rather than
    /// divide by zero, but the resulting plot is meaningless.
    pub fn is_valid(&self) -> bool {
        self.x.start.is_finite() && self.x.end.is_finite() && self.x.start < self.x.end
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("x range", &self.x)
            .field("samples", &self.samples)
            .finish()
    }
}
