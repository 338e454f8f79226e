// SPDX: CC0-1.0

//! Turns compiled functions into screen-space geometry: polyline segments
//! that break at jumps, corners, and undefined samples, plus markers, axis
//! ticks, and the tangent line. Everything here is pure; putting pixels on
//! an output surface is the binary's job.

use crate::{
    coord::{self, Mapper, ScreenRect},
    diff::Derivative,
    eval::Compiled,
    range, Number, Point, Viewport,
};
use core::{mem, ops::Range};

pub const SAMPLES_MIN: usize = 100;
pub const SAMPLES_MAX: usize = 4000;

/// Denominator floor for relative-jump ratios.
pub const REL_EPSILON: Number = 1e-12;

const TICK_TARGET: usize = 8;

/// Jump and corner detection thresholds. A sample interval is a break only
/// when it clears both the absolute and the relative member of a pair, which
/// keeps small-scale noise and legitimately steep regions from splitting the
/// curve. These are calibrated heuristics, not a discontinuity decision
/// procedure; expect them to be approximately right.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Value-jump pair for the function curve.
    pub jump_abs: Number,
    pub jump_rel: Number,
    /// Value-jump pair for the derivative curve.
    pub deriv_jump_abs: Number,
    pub deriv_jump_rel: Number,
    /// One-sided slope disagreement marking a corner.
    pub corner_abs: Number,
    pub corner_rel: Number,
    /// Looser pair used only to place discontinuity marker dots.
    pub dot_abs: Number,
    pub dot_rel: Number,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            jump_abs: 0.75,
            jump_rel: 0.40,
            deriv_jump_abs: 0.60,
            deriv_jump_rel: 0.35,
            corner_abs: 0.50,
            corner_rel: 0.30,
            dot_abs: 0.30,
            dot_rel: 0.30,
        }
    }
}

/// Logical (CSS) pixel geometry of the render target: two equally tall
/// panels, f above f', separated by a fixed gap. `scale` is the display
/// multiplier an output adapter applies for sharpness; the math here never
/// sees it.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    pub width: Number,
    pub height: Number,
    pub gap: Number,
    pub scale: Number,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 720.0,
            gap: 16.0,
            scale: 1.0,
        }
    }
}

impl Layout {
    pub fn panel_height(&self) -> Number {
        (self.height - self.gap) / 2.0
    }

    /// Panel for the function curve.
    pub fn upper(&self) -> ScreenRect {
        ScreenRect::new(
            Point::new(0.0, 0.0),
            Point::new(self.width, self.panel_height()),
        )
    }

    /// Panel for the derivative curve.
    pub fn lower(&self) -> ScreenRect {
        ScreenRect::new(
            Point::new(0.0, self.panel_height() + self.gap),
            Point::new(self.width, self.height),
        )
    }
}

/// Inputs of one render pass.
pub struct Scene<'a> {
    pub f: &'a Compiled,
    pub df: &'a Derivative,
    pub view: Viewport,
    pub show_derivative: bool,
    /// Tangent anchor candidate: the locked x, or the pointer-hover x.
    /// `None` draws no tangent.
    pub tangent: Option<Number>,
    pub thresholds: Thresholds,
    pub layout: Layout,
}

#[derive(Clone, Debug)]
pub struct Tick {
    pub value: Number,
    pub pos: Point<Number>,
    pub label: String,
}

/// Geometry of one panel, all positions in logical screen pixels.
#[derive(Clone, Debug)]
pub struct Panel {
    pub rect: ScreenRect,
    /// World y range the panel displays.
    pub range: Range<Number>,
    pub segments: Vec<Vec<Point<Number>>>,
    /// Paired one-sided limits at corners, drawn as open circles.
    pub holes: Vec<Point<Number>>,
    /// Marker dots flanking detected jumps.
    pub dots: Vec<Point<Number>>,
    pub x_ticks: Vec<Tick>,
    pub y_ticks: Vec<Tick>,
}

#[derive(Clone, Debug)]
pub struct TangentLine {
    /// Full-width line through the anchor with slope f'(x0).
    pub line: [Point<Number>; 2],
    /// Vertical guide at the anchor.
    pub guide: [Point<Number>; 2],
    pub anchor: Point<Number>,
    pub label: String,
}

/// Everything one pass produces. Rebuilt from scratch on every input change;
/// nothing in here survives to the next frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub layout: Layout,
    pub domain: Range<Number>,
    pub f_panel: Panel,
    pub d_panel: Option<Panel>,
    pub tangent: Option<TangentLine>,
}

/// Both members of a dual threshold pair must clear for a break.
pub fn is_jump(a: Number, b: Number, abs_t: Number, rel_t: Number) -> bool {
    let jump = (b - a).abs();
    let rel = jump / REL_EPSILON.max(a.abs().max(b.abs()));
    jump > abs_t && rel > rel_t
}

fn flush(segments: &mut Vec<Vec<Point<Number>>>, current: &mut Vec<Point<Number>>) {
    // a single orphaned point draws nothing
    if current.len() > 1 {
        segments.push(mem::take(current));
    } else {
        current.clear();
    }
}

/// Two-state walk over the samples: outside a segment, or extending one.
/// A non-finite sample closes the active segment without a point; a dual
/// threshold jump closes it and the offending sample opens the next one.
/// `corners` (when present) forces a break at flagged samples, dropping the
/// sample itself.
fn split_samples(
    xs: &[Number],
    ys: &[Number],
    corners: Option<&[Option<(Number, Number)>]>,
    mapper: &Mapper,
    abs_t: Number,
    rel_t: Number,
) -> (Vec<Vec<Point<Number>>>, Vec<Point<Number>>) {
    let mut segments = Vec::new();
    let mut holes = Vec::new();
    let mut current: Vec<Point<Number>> = Vec::new();
    let mut prev: Option<Number> = None;

    for (i, (&x, &y)) in xs.iter().zip(ys).enumerate() {
        if let Some(corners) = corners {
            if let Some((left, right)) = corners[i] {
                flush(&mut segments, &mut current);
                prev = None;
                holes.push(mapper.world_to_screen(Point::new(x, left)));
                holes.push(mapper.world_to_screen(Point::new(x, right)));
                continue;
            }
        }

        if !y.is_finite() {
            flush(&mut segments, &mut current);
            prev = None;
            continue;
        }

        if let Some(py) = prev {
            if is_jump(py, y, abs_t, rel_t) {
                flush(&mut segments, &mut current);
            }
        }
        current.push(mapper.world_to_screen(Point::new(x, y)));
        prev = Some(y);
    }
    flush(&mut segments, &mut current);

    (segments, holes)
}

/// One-sided slope disagreement of `f` at each interior sample, using half
/// the grid step. A flagged sample carries its (left, right) slope limits.
fn detect_corners(
    f: &Compiled,
    xs: &[Number],
    step: Number,
    abs_t: Number,
    rel_t: Number,
) -> Vec<Option<(Number, Number)>> {
    let h = step / 2.0;
    xs.iter()
        .enumerate()
        .map(|(i, &x)| {
            if i == 0 || i + 1 == xs.len() {
                return None;
            }
            let y = f.call(x);
            let left = (y - f.call(x - h)) / h;
            let right = (f.call(x + h) - y) / h;
            if !left.is_finite() || !right.is_finite() {
                return None;
            }
            let spread = (right - left).abs();
            let rel = spread / REL_EPSILON.max(left.abs().max(right.abs()));
            (spread > abs_t && rel > rel_t).then_some((left, right))
        })
        .collect()
}

/// Marker dots on the samples flanking a jump, judged by the looser dot
/// thresholds so a dot can flag near-misses the segment test lets through.
fn jump_dots(
    xs: &[Number],
    ys: &[Number],
    mapper: &Mapper,
    abs_t: Number,
    rel_t: Number,
) -> Vec<Point<Number>> {
    let mut dots = Vec::new();
    for i in 1..ys.len() {
        let (a, b) = (ys[i - 1], ys[i]);
        if a.is_finite() && b.is_finite() && is_jump(a, b, abs_t, rel_t) {
            dots.push(mapper.world_to_screen(Point::new(xs[i - 1], a)));
            dots.push(mapper.world_to_screen(Point::new(xs[i], b)));
        }
    }
    dots
}

fn panel_ticks(
    mapper: &Mapper,
    rect: ScreenRect,
    world_x: &Range<Number>,
    world_y: &Range<Number>,
) -> (Vec<Tick>, Vec<Tick>) {
    let x_ticks = coord::nice_ticks(world_x.start, world_x.end, TICK_TARGET)
        .into_iter()
        .map(|value| {
            let sx = mapper.world_to_screen(Point::new(value, world_y.start)).x;
            Tick {
                value,
                pos: Point::new(sx, rect.max.y),
                label: coord::format_tick(value),
            }
        })
        .collect();
    let y_ticks = coord::nice_ticks(world_y.start, world_y.end, TICK_TARGET)
        .into_iter()
        .map(|value| {
            let sy = mapper.world_to_screen(Point::new(world_x.start, value)).y;
            Tick {
                value,
                pos: Point::new(rect.min.x, sy),
                label: coord::format_tick(value),
            }
        })
        .collect();
    (x_ticks, y_ticks)
}

fn tangent_line(scene: &Scene<'_>, mapper: &Mapper) -> Option<TangentLine> {
    let anchor = scene.tangent?;
    if !anchor.is_finite() {
        return None;
    }
    let domain = &scene.view.x;
    let x0 = anchor.clamp(domain.start, domain.end);
    let y0 = scene.f.call(x0);
    let slope = scene.df.call(x0);
    // undefined value or undefined slope: no tangent to draw
    if !y0.is_finite() || !slope.is_finite() {
        return None;
    }

    let line_y = |x: Number| y0 + slope * (x - x0);
    let line = [
        mapper.world_to_screen(Point::new(domain.start, line_y(domain.start))),
        mapper.world_to_screen(Point::new(domain.end, line_y(domain.end))),
    ];
    let anchor_pt = mapper.world_to_screen(Point::new(x0, y0));
    let rect = scene.layout.upper();
    let guide = [
        Point::new(anchor_pt.x, rect.min.y),
        Point::new(anchor_pt.x, rect.max.y),
    ];
    let label = format!("x = {x0:.3}   f(x) = {y0:.3}   f'(x) = {slope:.3}");
    Some(TangentLine {
        line,
        guide,
        anchor: anchor_pt,
        label,
    })
}

/// One full render pass over the scene.
pub fn render(scene: &Scene<'_>) -> Frame {
    let n = scene.view.samples.clamp(SAMPLES_MIN, SAMPLES_MAX);
    let domain = scene.view.x.clone();
    let step = (domain.end - domain.start) / (n - 1) as Number;
    let xs: Vec<Number> = (0..n).map(|i| domain.start + step * i as Number).collect();
    let t = &scene.thresholds;

    // function panel
    let f_ys: Vec<Number> = xs.iter().map(|&x| scene.f.call(x)).collect();
    let f_range = range::estimate(|x| scene.f.call(x), &domain, n);
    let f_rect = scene.layout.upper();
    let f_mapper = Mapper::new(domain.clone(), f_range.clone(), f_rect);
    let (f_segments, _) = split_samples(&xs, &f_ys, None, &f_mapper, t.jump_abs, t.jump_rel);
    let dots = jump_dots(&xs, &f_ys, &f_mapper, t.dot_abs, t.dot_rel);
    let (f_x_ticks, f_y_ticks) = panel_ticks(&f_mapper, f_rect, &domain, &f_range);
    let f_panel = Panel {
        rect: f_rect,
        range: f_range,
        segments: f_segments,
        holes: Vec::new(),
        dots,
        x_ticks: f_x_ticks,
        y_ticks: f_y_ticks,
    };

    // derivative panel
    let d_panel = scene.show_derivative.then(|| {
        let d_ys: Vec<Number> = xs.iter().map(|&x| scene.df.call(x)).collect();
        let d_range = range::estimate(|x| scene.df.call(x), &domain, n);
        let d_rect = scene.layout.lower();
        let d_mapper = Mapper::new(domain.clone(), d_range.clone(), d_rect);
        let corners = detect_corners(scene.f, &xs, step, t.corner_abs, t.corner_rel);
        let (segments, holes) = split_samples(
            &xs,
            &d_ys,
            Some(&corners),
            &d_mapper,
            t.deriv_jump_abs,
            t.deriv_jump_rel,
        );
        let (x_ticks, y_ticks) = panel_ticks(&d_mapper, d_rect, &domain, &d_range);
        Panel {
            rect: d_rect,
            range: d_range,
            segments,
            holes,
            dots: Vec::new(),
            x_ticks,
            y_ticks,
        }
    });

    let tangent = tangent_line(scene, &f_mapper);

    Frame {
        layout: scene.layout,
        domain,
        f_panel,
        d_panel,
        tangent,
    }
}

/// Pointer position (logical pixels) to a world x, but only while the
/// pointer is inside the function panel's vertical extent. Outside it the
/// hover is cleared.
pub fn hover_x(pointer: Point<Number>, layout: &Layout, domain: &Range<Number>) -> Option<Number> {
    let rect = layout.upper();
    if pointer.y < rect.min.y || pointer.y > rect.max.y {
        return None;
    }
    let t = (pointer.x - rect.min.x) / rect.width().max(1e-12);
    Some(domain.start + t * (domain.end - domain.start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib;
    use approx::assert_abs_diff_eq;

    fn scene_for<'a>(
        f: &'a Compiled,
        df: &'a Derivative,
        domain: Range<Number>,
        samples: usize,
    ) -> Scene<'a> {
        Scene {
            f,
            df,
            view: Viewport { x: domain, samples },
            show_derivative: true,
            tangent: None,
            thresholds: Thresholds::default(),
            layout: Layout::default(),
        }
    }

    fn compiled(input: &str) -> (Compiled, Derivative) {
        let f = Compiled::compile(input, &stdlib::standard_idents()).expect("compiles");
        let df = Derivative::of(&f);
        (f, df)
    }

    /// Screen x of a world x in the given panel.
    fn screen_x(frame: &Frame, panel: &Panel, x: Number) -> Number {
        let mapper = Mapper::new(frame.domain.clone(), panel.range.clone(), panel.rect);
        mapper.world_to_screen(Point::new(x, 0.0)).x
    }

    fn world_of(frame: &Frame, panel: &Panel, p: Point<Number>) -> Point<Number> {
        let mapper = Mapper::new(frame.domain.clone(), panel.range.clone(), panel.rect);
        mapper.screen_to_world(p)
    }

    #[test]
    fn smooth_curve_is_one_segment() {
        let (f, df) = compiled("sin(x)");
        let frame = render(&scene_for(&f, &df, -3.0..3.0, 500));
        assert_eq!(frame.f_panel.segments.len(), 1);
        assert_eq!(frame.f_panel.segments[0].len(), 500);
        assert!(frame.f_panel.dots.is_empty());
        let d = frame.d_panel.as_ref().unwrap();
        assert_eq!(d.segments.len(), 1);
        assert!(d.holes.is_empty());
    }

    #[test]
    fn step_function_splits_at_zero() {
        let (f, df) = compiled("x < 0 ? -1 : 1");
        let frame = render(&scene_for(&f, &df, -2.0..2.0, 400));
        assert!(frame.f_panel.segments.len() >= 2);

        let split = screen_x(&frame, &frame.f_panel, 0.0);
        for seg in &frame.f_panel.segments {
            let all_left = seg.iter().all(|p| p.x < split + 1e-9);
            let all_right = seg.iter().all(|p| p.x > split - 1e-9);
            assert!(all_left || all_right, "segment spans the step");
        }
    }

    #[test]
    fn reciprocal_jump_is_detected_without_nan_samples() {
        let (f, df) = compiled("1/x");
        let frame = render(&scene_for(&f, &df, -5.0..5.0, 1000));
        // 1000 samples over [-5, 5] never land on x = 0
        assert!(frame.f_panel.segments.len() >= 2);
        assert!(!frame.f_panel.dots.is_empty());

        let split = screen_x(&frame, &frame.f_panel, 0.0);
        for seg in &frame.f_panel.segments {
            let all_left = seg.iter().all(|p| p.x < split + 1e-9);
            let all_right = seg.iter().all(|p| p.x > split - 1e-9);
            assert!(all_left || all_right, "segment spans the pole");
        }
    }

    #[test]
    fn log_draws_nothing_left_of_zero() {
        let (f, df) = compiled("log(x)");
        let frame = render(&scene_for(&f, &df, -10.0..10.0, 800));
        let panel = &frame.f_panel;
        for seg in &panel.segments {
            for &p in seg {
                let w = world_of(&frame, panel, p);
                assert!(w.x > 0.0, "point at x = {} should not exist", w.x);
            }
        }
    }

    #[test]
    fn abs_corner_yields_paired_holes() {
        let (f, df) = compiled("abs(x)");
        // odd count puts a sample exactly on the kink
        let frame = render(&scene_for(&f, &df, -2.0..2.0, 401));
        let d = frame.d_panel.as_ref().unwrap();
        assert_eq!(d.holes.len(), 2, "one corner, two one-sided limits");
        assert!(d.segments.len() >= 2);

        let left = world_of(&frame, d, d.holes[0]);
        let right = world_of(&frame, d, d.holes[1]);
        assert_abs_diff_eq!(left.y, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(right.y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(left.x, right.x, epsilon = 1e-9);
    }

    #[test]
    fn no_tangent_at_a_corner() {
        let (f, df) = compiled("abs(x)");
        let mut scene = scene_for(&f, &df, -2.0..2.0, 401);
        scene.tangent = Some(0.0);
        let frame = render(&scene);
        assert!(frame.tangent.is_none());
    }

    #[test]
    fn tangent_geometry_and_label() {
        let (f, df) = compiled("x^2");
        let mut scene = scene_for(&f, &df, -4.0..4.0, 400);
        scene.tangent = Some(1.0);
        let frame = render(&scene);
        let tangent = frame.tangent.as_ref().expect("tangent drawn");

        let anchor = world_of(&frame, &frame.f_panel, tangent.anchor);
        assert_abs_diff_eq!(anchor.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(anchor.y, 1.0, epsilon = 1e-9);

        // slope 2 through (1, 1): endpoints at y = -9 and y = 7
        let start = world_of(&frame, &frame.f_panel, tangent.line[0]);
        let end = world_of(&frame, &frame.f_panel, tangent.line[1]);
        assert_abs_diff_eq!(start.y, -9.0, epsilon = 1e-6);
        assert_abs_diff_eq!(end.y, 7.0, epsilon = 1e-6);

        assert_abs_diff_eq!(tangent.guide[0].x, tangent.anchor.x);
        assert!(tangent.label.contains("x = 1.000"));
        assert!(tangent.label.contains("f'(x) = 2.000"));
    }

    #[test]
    fn tangent_anchor_clamps_into_the_domain() {
        let (f, df) = compiled("x^2");
        let mut scene = scene_for(&f, &df, -4.0..4.0, 400);
        scene.tangent = Some(100.0);
        let frame = render(&scene);
        let tangent = frame.tangent.as_ref().expect("tangent drawn");
        let anchor = world_of(&frame, &frame.f_panel, tangent.anchor);
        assert_abs_diff_eq!(anchor.x, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn tangent_suppressed_off_domain_of_f() {
        let (f, df) = compiled("log(x)");
        let mut scene = scene_for(&f, &df, -10.0..10.0, 800);
        scene.tangent = Some(-3.0);
        let frame = render(&scene);
        assert!(frame.tangent.is_none());
    }

    #[test]
    fn sample_count_clamps() {
        let (f, df) = compiled("x");
        let frame = render(&scene_for(&f, &df, 0.0..1.0, 3));
        let total: usize = frame.f_panel.segments.iter().map(Vec::len).sum();
        assert_eq!(total, SAMPLES_MIN);

        let frame = render(&scene_for(&f, &df, 0.0..1.0, 100_000));
        let total: usize = frame.f_panel.segments.iter().map(Vec::len).sum();
        assert_eq!(total, SAMPLES_MAX);
    }

    #[test]
    fn derivative_panel_is_optional() {
        let (f, df) = compiled("x");
        let mut scene = scene_for(&f, &df, 0.0..1.0, 200);
        scene.show_derivative = false;
        let frame = render(&scene);
        assert!(frame.d_panel.is_none());
    }

    #[test]
    fn hover_only_inside_the_upper_panel() {
        let layout = Layout::default();
        let domain = -4.0..4.0;
        // middle of the upper panel maps to the middle of the domain
        let mid = hover_x(
            Point::new(layout.width / 2.0, layout.panel_height() / 2.0),
            &layout,
            &domain,
        );
        assert_abs_diff_eq!(mid.unwrap(), 0.0, epsilon = 1e-9);

        let left = hover_x(Point::new(0.0, 10.0), &layout, &domain).unwrap();
        assert_abs_diff_eq!(left, -4.0, epsilon = 1e-9);

        // below the gap is the derivative panel: no hover
        assert!(hover_x(
            Point::new(100.0, layout.panel_height() + layout.gap + 5.0),
            &layout,
            &domain
        )
        .is_none());
    }

    #[test]
    fn ticks_line_up_with_panel_edges() {
        let (f, df) = compiled("sin(x)");
        let frame = render(&scene_for(&f, &df, -4.0..4.0, 200));
        let panel = &frame.f_panel;
        assert!(!panel.x_ticks.is_empty() && !panel.y_ticks.is_empty());
        for tick in &panel.x_ticks {
            assert_abs_diff_eq!(tick.pos.y, panel.rect.max.y);
            assert!(tick.pos.x >= panel.rect.min.x - 1e-9);
            assert!(tick.pos.x <= panel.rect.max.x + 1e-9);
        }
        for tick in &panel.y_ticks {
            assert_abs_diff_eq!(tick.pos.x, panel.rect.min.x);
        }
        let d = frame.d_panel.as_ref().unwrap();
        for tick in &d.x_ticks {
            assert_abs_diff_eq!(tick.pos.y, d.rect.max.y);
        }
    }
}
