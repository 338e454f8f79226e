// SPDX: CC0-1.0

//! Affine world/screen transforms and axis tick placement.

use crate::{Number, Point};
use core::ops::Range;

/// Spans below this are widened before mapping so a degenerate viewport
/// cannot produce a division by zero.
const MIN_SPAN: Number = 1e-12;

/// Axis-aligned rectangle in screen space, y growing downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub min: Point<Number>,
    pub max: Point<Number>,
}

impl ScreenRect {
    pub const fn new(min: Point<Number>, max: Point<Number>) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> Number {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> Number {
        self.max.y - self.min.y
    }
}

/// Linear map between a world window and a screen rectangle. The y axis
/// flips: world y grows up, screen y grows down.
#[derive(Clone, Debug)]
pub struct Mapper {
    world_x: Range<Number>,
    world_y: Range<Number>,
    screen: ScreenRect,
}

impl Mapper {
    pub fn new(world_x: Range<Number>, world_y: Range<Number>, screen: ScreenRect) -> Self {
        Self {
            world_x,
            world_y,
            screen,
        }
    }

    fn x_span(&self) -> Number {
        (self.world_x.end - self.world_x.start).max(MIN_SPAN)
    }

    fn y_span(&self) -> Number {
        (self.world_y.end - self.world_y.start).max(MIN_SPAN)
    }

    pub fn world_to_screen(&self, p: Point<Number>) -> Point<Number> {
        let x_norm = (p.x - self.world_x.start) / self.x_span();
        let y_norm = (p.y - self.world_y.start) / self.y_span();
        Point {
            x: self.screen.min.x + x_norm * self.screen.width(),
            y: self.screen.max.y - y_norm * self.screen.height(),
        }
    }

    pub fn screen_to_world(&self, p: Point<Number>) -> Point<Number> {
        let x_norm = (p.x - self.screen.min.x) / self.screen.width();
        let y_norm = (self.screen.max.y - p.y) / self.screen.height();
        Point {
            x: self.world_x.start + x_norm * self.x_span(),
            y: self.world_y.start + y_norm * self.y_span(),
        }
    }
}

/// Step size from the {1, 2, 5} × 10^k family closest to dividing `span`
/// into `target` intervals.
pub fn nice_step(span: Number, target: usize) -> Number {
    let raw = span / target.max(1) as Number;
    let mag = 10f64.powf(raw.abs().log10().floor());
    let norm = raw / mag;
    let nice = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * mag
}

/// Every multiple of the nice step inside `[min, max]`, ascending. Reversed
/// bounds are swapped, and a zero-width range is treated as spanning 1 so
/// there is always a step to walk.
pub fn nice_ticks(min: Number, max: Number, target: usize) -> Vec<Number> {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let span = if max - min > 0.0 { max - min } else { 1.0 };
    let step = nice_step(span, target);

    let first = (min / step).ceil() * step;
    let mut ticks = Vec::new();
    let mut i = 0usize;
    loop {
        let v = first + step * i as Number;
        // tolerate one step of float drift at the far end; bail outright if
        // the walk ever leaves finite territory
        if !v.is_finite() || v > max + step * 1e-9 {
            break;
        }
        // drop the negative zero the multiplication can produce
        ticks.push(if v == 0.0 { 0.0 } else { v });
        i += 1;
    }
    ticks
}

/// Tick label, with the trailing ".0" dropped for integral values.
pub fn format_tick(v: Number) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.3}")
    }
}
