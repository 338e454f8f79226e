// SPDX: CC0-1.0

use anyhow::Context;
use chrono::{DateTime, Local};
use std::{
    fs::OpenOptions,
    io::{self, stdout, BufWriter, Write},
    process::ExitCode,
};
use tangent_plot::{
    diff::Derivative,
    eval::{Compiled, Ident, Idents},
    lex::LexErrTyp,
    parse::{ParseErr, ParseErrTyp},
    render::{self, Frame, Layout, Panel, Scene, Thresholds, SAMPLES_MAX, SAMPLES_MIN},
    shell::{self, Command},
    stdlib, Number, Point, Viewport,
};

// TODOO: pan/zoom commands that reuse the previous frame's ranges

fn output_svg_filename(now: DateTime<Local>) -> String {
    format!(
        "{}_output-{}.{}",
        env!("CARGO_PKG_NAME"),
        now.format("%Y-%m-%d_%H-%M-%S"),
        "svg"
    )
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("unexpected error: {err}");
            let chain = err.chain();
            if chain.len() > 1 {
                eprintln!();
                eprintln!("context:");
                for it in chain.skip(1) {
                    eprintln!("  {it}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
struct State {
    expr: Option<String>,
    f: Option<Compiled>,
    df: Option<Derivative>,
    idents: Idents,
    view: Viewport,
    show_derivative: bool,
    show_tangent: bool,
    /// Locked tangent anchor; `None` follows the pointer.
    locked: Option<Number>,
    /// World x under the (simulated) pointer, if it is over the f panel.
    hover: Option<Number>,
    thresholds: Thresholds,
    layout: Layout,
}

fn try_main() -> anyhow::Result<()> {
    let mut state = State {
        expr: None,
        f: None,
        df: None,
        idents: stdlib::standard_idents(),
        view: Viewport {
            x: -4.0..4.0,
            samples: 800,
        },
        show_derivative: true,
        show_tangent: false,
        locked: None,
        hover: None,
        thresholds: Thresholds::default(),
        layout: Layout::default(),
    };

    // something to look at before the first `set`
    let seeded = set_function(io::sink(), &mut state, "sin(x) + x^2/5")?;
    debug_assert!(seeded);

    let mut stdout = BufWriter::new(stdout());
    loop {
        if let Some(ref expr) = state.expr {
            writeln!(stdout, "f(x) = {expr}")?;
        } else {
            writeln!(stdout, "f(x) is not set")?;
        }

        let mut try_cmd = shell::input(&mut stdout, "> ")?;
        try_cmd.make_ascii_lowercase();
        writeln!(stdout)?;

        if let Ok(cmd) = try_cmd.parse::<Command>() {
            match cmd {
                Command::Help => {
                    for c in Command::exhaustive() {
                        writeln!(stdout, "{name}: {help}", name = c.name(), help = c.help())?;
                    }
                }

                Command::Quit => break,

                Command::SetExpr => set_expr(&mut stdout, &mut state)?,

                Command::SetWin => set_win(&mut stdout, &mut state)?,

                Command::Deriv => {
                    state.show_derivative = !state.show_derivative;
                    writeln!(
                        stdout,
                        "derivative panel is {}",
                        if state.show_derivative { "on" } else { "off" }
                    )?;
                }

                Command::Tangent => set_tangent(&mut stdout, &mut state)?,

                Command::PrintProg => print_prog(&mut stdout, &state)?,

                Command::Plot => plot_expr(&mut stdout, &state)?,
            }
        } else {
            writeln!(stdout, r#"Unknown command, try "help" for help"#)?;
        }

        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}

fn set_expr<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    let input = shell::input(&mut out, "f(x) = ")?;
    if input.is_empty() {
        return Ok(());
    }
    set_function(&mut out, state, &input)?;
    Ok(())
}

/// Compile `input` and install it (with its derivative) on success. Returns
/// whether compilation succeeded; diagnostics go to `out` either way.
fn set_function<W: Write>(mut out: W, state: &mut State, input: &str) -> anyhow::Result<bool> {
    match Compiled::compile(input, &state.idents) {
        Ok(f) => {
            state.df = Some(Derivative::of(&f));
            state.f = Some(f);
            state.expr = Some(input.trim().to_string());
            Ok(true)
        }
        Err(err) => {
            report_parse_err(&mut out, &err, &state.idents)?;
            Ok(false)
        }
    }
}

fn report_parse_err<W: Write>(mut out: W, err: &ParseErr, idents: &Idents) -> anyhow::Result<()> {
    writeln!(out)?;
    shell::underline(&mut out, &err.loc)?;
    writeln!(out, "parse error: {}", err.typ)?;

    match &err.typ {
        ParseErrTyp::LexErr(lex_err) => match lex_err {
            LexErrTyp::InvalidChar => {
                writeln!(
                    out,
                    "note: available tokens are numbers, identifiers, and symbols +-*/^,()<>?:"
                )?;
            }
            LexErrTyp::Unsupported(typ) => {
                use tangent_plot::lex::TokTyp;
                match typ {
                    TokTyp::XAssign => {
                        writeln!(out, "note: use '==' to compare values")?;
                    }
                    TokTyp::XPipe => {
                        writeln!(
                            out,
                            "note: bars only work around the whole expression; use the 'abs' function elsewhere"
                        )?;
                    }
                    TokTyp::XOpenSquareBracket
                    | TokTyp::XCloseSquareBracket
                    | TokTyp::XOpenCurly
                    | TokTyp::XCloseCurly => {
                        writeln!(out, "note: only round parentheses group expressions")?;
                    }
                    _ => {}
                }
            }
        },

        ParseErrTyp::ParseNum(_) => {
            writeln!(out, "note: parsing as floating point number")?;
        }

        ParseErrTyp::TrailingOperand => {
            writeln!(
                out,
                "note: implicit multiplication is not supported, so for example '5x' would be '5*x'",
            )?;
        }

        ParseErrTyp::UndefinedIdent { text } => {
            let most_similar = idents
                .iter()
                .map(|(k, v)| {
                    (
                        strsim::normalized_damerau_levenshtein(
                            // HACK: this is wasteful but that's not important
                            &text.get().to_ascii_lowercase(),
                            &k.get().to_ascii_lowercase(),
                        ),
                        (k, v),
                    )
                })
                .reduce(|(acc_sim, acc_kv), (elem_sim, elem_kv)| {
                    if elem_sim > acc_sim {
                        (elem_sim, elem_kv)
                    } else {
                        (acc_sim, acc_kv)
                    }
                });
            if let Some((sim, (key, ident))) = most_similar {
                if sim > 0.3 {
                    let ident_typ = match ident {
                        Ident::Var => "variable",
                        Ident::Const(_) => "constant",
                        Ident::Fun(_) => "function",
                    };
                    writeln!(out, "note: {ident_typ} '{key}' has a similar name")?;
                }
            }
        }

        ParseErrTyp::ParenMismatch
        | ParseErrTyp::Empty
        | ParseErrTyp::MissingOperand
        | ParseErrTyp::MisplacedColon
        | ParseErrTyp::UnfinishedTernary => {}
    }

    Ok(())
}

fn set_win<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    writeln!(out, "view = {:#}", state.view)?;
    writeln!(out)?;
    writeln!(out, "note: leave blank to skip")?;

    let mut x = state.view.x.clone();
    for (name, dst) in [("x min", &mut x.start), ("x max", &mut x.end)] {
        match shell::read_fromstr::<_, Number>(
            &mut out,
            format_args!("?{name} (is {cur}) = ", cur = *dst),
            true,
        )? {
            Ok(Some(new)) => *dst = new,
            Ok(None) => {}
            Err(_) => return Ok(()),
        }
    }
    if x.start.is_finite() && x.end.is_finite() && x.start < x.end {
        state.view.x = x;
    } else {
        writeln!(
            out,
            "error: x range needs finite bounds with min < max; keeping {:?}",
            state.view.x
        )?;
    }

    writeln!(
        out,
        "note: sample count is clamped to [{SAMPLES_MIN}, {SAMPLES_MAX}]"
    )?;
    match shell::read_fromstr::<_, usize>(
        &mut out,
        format_args!("?samples (is {cur}) = ", cur = state.view.samples),
        true,
    )? {
        Ok(Some(new)) => state.view.samples = new.clamp(SAMPLES_MIN, SAMPLES_MAX),
        Ok(None) => {}
        Err(_) => return Ok(()),
    }

    match shell::read_fromstr::<_, Number>(
        &mut out,
        format_args!("?display scale (is {cur}) = ", cur = state.layout.scale),
        true,
    )? {
        Ok(Some(new)) if new > 0.0 && new.is_finite() => state.layout.scale = new,
        Ok(Some(_)) => writeln!(out, "error: display scale must be positive")?,
        Ok(None) => {}
        Err(_) => return Ok(()),
    }

    Ok(())
}

fn set_tangent<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    state.show_tangent = shell::read_toggle(
        &mut out,
        format_args!(
            "?show tangent (y/n, is {cur}) = ",
            cur = if state.show_tangent { "y" } else { "n" }
        ),
        state.show_tangent,
    )?;
    if !state.show_tangent {
        return Ok(());
    }

    // the anchor goes through the expression pipeline, so 'pi/2' works
    let anchor = shell::input(&mut out, "?anchor x (expression, blank to follow the pointer) = ")?;
    if !anchor.is_empty() {
        match Compiled::compile(&anchor, &state.idents) {
            Ok(compiled) => {
                let x0 = compiled.call(0.0);
                if x0.is_finite() {
                    state.locked = Some(x0);
                    writeln!(out, "tangent locked at x = {x0}")?;
                } else {
                    writeln!(out, "error: anchor evaluates to an undefined value")?;
                }
            }
            Err(err) => report_parse_err(&mut out, &err, &state.idents)?,
        }
        return Ok(());
    }
    state.locked = None;

    // no real pointer in a line-based shell, so take its pixel position here
    let pointer = shell::input(&mut out, "?pointer 'px py' in logical pixels (blank for none) = ")?;
    if pointer.is_empty() {
        state.hover = None;
        return Ok(());
    }
    let mut parts = pointer.split_whitespace();
    let parsed = (|| {
        let px: Number = parts.next()?.parse().ok()?;
        let py: Number = parts.next()?.parse().ok()?;
        Some(Point::new(px, py))
    })();
    match parsed {
        Some(p) => {
            state.hover = render::hover_x(p, &state.layout, &state.view.x);
            match state.hover {
                Some(x) => writeln!(out, "pointer is over x = {x}")?,
                None => writeln!(out, "pointer is outside the function panel")?,
            }
        }
        None => writeln!(out, "error: expected two numbers, like '480 176'")?,
    }

    Ok(())
}

fn print_prog<W: Write>(mut out: W, state: &State) -> anyhow::Result<()> {
    let (f, df) = match (&state.f, &state.df) {
        (Some(f), Some(df)) => (f, df),
        _ => {
            shell::expr_undefined(&mut out)?;
            return Ok(());
        }
    };
    writeln!(out, "f(x) = {}", f.ast())?;
    match df.symbolic_ast() {
        Some(ast) => writeln!(out, "f'(x) = {ast}")?,
        None => writeln!(out, "f'(x) has no symbolic form; using central differences")?,
    }
    Ok(())
}

fn plot_expr<W: Write>(mut out: W, state: &State) -> anyhow::Result<()> {
    let (f, df) = match (&state.f, &state.df) {
        (Some(f), Some(df)) => (f, df),
        _ => {
            shell::expr_undefined(&mut out)?;
            return Ok(());
        }
    };
    if !state.view.is_valid() {
        writeln!(out, "error: x range is invalid, fix it with 'window'")?;
        return Ok(());
    }

    let tangent = if state.show_tangent {
        state.locked.or(state.hover)
    } else {
        None
    };
    let scene = Scene {
        f,
        df,
        view: state.view.clone(),
        show_derivative: state.show_derivative,
        tangent,
        thresholds: state.thresholds,
        layout: state.layout,
    };
    let frame = render::render(&scene);

    let now = Local::now();
    let svg_path = output_svg_filename(now);
    let mut svg = BufWriter::new(
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&svg_path)
            .context("failed to open output svg file")?,
    );
    write_svg(
        &mut svg,
        &frame,
        state.expr.as_deref().unwrap_or(""),
    )
    .context("failed to write output svg file")?;
    svg.flush()?;
    svg.get_mut().sync_data()?;
    drop(svg);

    writeln!(out, "wrote {svg_path}")?;
    Ok(())
}

const BACKGROUND_COLOR: &str = "#fcfcf7";
const CURVE_COLOR: &str = "#27422e";
const DERIV_COLOR: &str = "#7a3b1e";
const TANGENT_COLOR: &str = "#1e4f7a";
const AXIS_COLOR: &str = "#9a9a8e";
const TEXT_COLOR: &str = "#3a3a33";

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn write_panel<W: Write>(
    out: &mut W,
    panel: &Panel,
    id: usize,
    color: &str,
) -> io::Result<()> {
    let rect = panel.rect;
    writeln!(
        out,
        r#"  <clipPath id="panel{id}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath>"#,
        rect.min.x,
        rect.min.y,
        rect.width(),
        rect.height(),
    )?;
    writeln!(
        out,
        r#"  <rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{AXIS_COLOR}"/>"#,
        rect.min.x,
        rect.min.y,
        rect.width(),
        rect.height(),
    )?;

    for tick in &panel.x_ticks {
        writeln!(
            out,
            r#"  <line x1="{x:.2}" y1="{y0:.2}" x2="{x:.2}" y2="{y1:.2}" stroke="{AXIS_COLOR}"/>"#,
            x = tick.pos.x,
            y0 = tick.pos.y - 5.0,
            y1 = tick.pos.y,
        )?;
        writeln!(
            out,
            r#"  <text x="{x:.2}" y="{y:.2}" font-size="11" text-anchor="middle" fill="{TEXT_COLOR}">{label}</text>"#,
            x = tick.pos.x,
            y = tick.pos.y - 8.0,
            label = tick.label,
        )?;
    }
    for tick in &panel.y_ticks {
        writeln!(
            out,
            r#"  <line x1="{x0:.2}" y1="{y:.2}" x2="{x1:.2}" y2="{y:.2}" stroke="{AXIS_COLOR}"/>"#,
            x0 = tick.pos.x,
            x1 = tick.pos.x + 5.0,
            y = tick.pos.y,
        )?;
        writeln!(
            out,
            r#"  <text x="{x:.2}" y="{y:.2}" font-size="11" fill="{TEXT_COLOR}">{label}</text>"#,
            x = tick.pos.x + 8.0,
            y = tick.pos.y - 3.0,
            label = tick.label,
        )?;
    }

    writeln!(out, r#"  <g clip-path="url(#panel{id})">"#)?;
    for seg in &panel.segments {
        write!(out, r#"    <polyline fill="none" stroke="{color}" stroke-width="1.5" points=""#)?;
        for (i, p) in seg.iter().enumerate() {
            if i > 0 {
                write!(out, " ")?;
            }
            write!(out, "{:.2},{:.2}", p.x, p.y)?;
        }
        writeln!(out, r#""/>"#)?;
    }
    for dot in &panel.dots {
        writeln!(
            out,
            r#"    <circle cx="{:.2}" cy="{:.2}" r="2.5" fill="{color}"/>"#,
            dot.x, dot.y,
        )?;
    }
    for hole in &panel.holes {
        writeln!(
            out,
            r#"    <circle cx="{:.2}" cy="{:.2}" r="3" fill="{BACKGROUND_COLOR}" stroke="{color}" stroke-width="1.5"/>"#,
            hole.x, hole.y,
        )?;
    }
    writeln!(out, "  </g>")?;
    Ok(())
}

/// Serialize a frame. The geometry is in logical pixels; the svg is sized at
/// `scale` times that with a logical-unit viewBox, which is what keeps the
/// curves sharp on dense displays.
fn write_svg<W: Write>(out: &mut W, frame: &Frame, title: &str) -> io::Result<()> {
    let Layout {
        width,
        height,
        scale,
        ..
    } = frame.layout;
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {width} {height}">"#,
        width * scale,
        height * scale,
    )?;
    writeln!(
        out,
        r##"  <rect width="{width}" height="{height}" fill="{BACKGROUND_COLOR}"/>"##
    )?;

    write_panel(out, &frame.f_panel, 0, CURVE_COLOR)?;
    if let Some(ref d_panel) = frame.d_panel {
        write_panel(out, d_panel, 1, DERIV_COLOR)?;
    }

    if let Some(ref tangent) = frame.tangent {
        writeln!(out, r#"  <g clip-path="url(#panel0)">"#)?;
        writeln!(
            out,
            r#"    <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{TANGENT_COLOR}" stroke-width="1.5"/>"#,
            tangent.line[0].x, tangent.line[0].y, tangent.line[1].x, tangent.line[1].y,
        )?;
        writeln!(
            out,
            r#"    <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{TANGENT_COLOR}" stroke-dasharray="4 3"/>"#,
            tangent.guide[0].x, tangent.guide[0].y, tangent.guide[1].x, tangent.guide[1].y,
        )?;
        writeln!(
            out,
            r#"    <circle cx="{:.2}" cy="{:.2}" r="3" fill="{TANGENT_COLOR}"/>"#,
            tangent.anchor.x, tangent.anchor.y,
        )?;
        writeln!(out, "  </g>")?;
        writeln!(
            out,
            r#"  <text x="10" y="34" font-size="12" fill="{TANGENT_COLOR}">{label}</text>"#,
            label = xml_escape(&tangent.label),
        )?;
    }

    writeln!(
        out,
        r#"  <text x="10" y="16" font-size="13" fill="{TEXT_COLOR}">f(x) = {title}</text>"#,
        title = xml_escape(title),
    )?;

    writeln!(out, "</svg>")?;
    Ok(())
}
