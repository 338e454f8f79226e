// SPDX: CC0-1.0

use crate::lex::SubStr;
use anyhow::Context;
use core::fmt;
use std::{
    io::{self, stdin, BufRead, Write},
    sync::Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    SetExpr,
    SetWin,
    Deriv,
    Tangent,
    PrintProg,
    Plot,
}

impl Command {
    pub const fn exhaustive() -> &'static [Command] {
        &[
            Self::Help,
            Self::Quit,
            Self::SetExpr,
            Self::SetWin,
            Self::Deriv,
            Self::Tangent,
            Self::Plot,
            Self::PrintProg,
        ]
    }

    pub const fn help(&self) -> &'static str {
        match self {
            Self::Help => "display help for each command",
            Self::Quit => "quit the shell",
            Self::SetExpr => "set the function to plot",
            Self::SetWin => "set the x range and sample count",
            Self::Deriv => "toggle the derivative panel",
            Self::Tangent => "configure the tangent line and its anchor",
            Self::PrintProg => "print the compiled expression and its derivative (for debugging)",
            Self::Plot => "render the function and derivative to an svg file",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Quit => "quit",
            Self::SetExpr => "set",
            Self::SetWin => "window",
            Self::Deriv => "deriv",
            Self::Tangent => "tangent",
            Self::PrintProg => "prog",
            Self::Plot => "plot",
        }
    }
}

impl core::str::FromStr for Command {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for c in Self::exhaustive() {
            if s == c.name() {
                return Ok(*c);
            }
        }
        Err(())
    }
}

pub fn input<W: Write>(out: W, prompt: impl fmt::Display) -> anyhow::Result<String> {
    fn inner<W: Write>(mut out: W, prompt: impl fmt::Display) -> io::Result<String> {
        write!(out, "{prompt}")?;
        out.flush()?;
        let mut stdin = stdin().lock();
        let mut s = String::new();
        stdin.read_line(&mut s)?;
        Ok(s.trim().to_string())
    }

    let s = inner(out, prompt).context("read from standard input failed")?;
    Ok(s)
}

pub fn read_fromstr<W: Write, T: core::str::FromStr>(
    mut out: W,
    prompt: impl fmt::Display,
    ignore_empty: bool,
) -> anyhow::Result<Result<Option<T>, <T as core::str::FromStr>::Err>>
where
    <T as core::str::FromStr>::Err: fmt::Display,
{
    let input = Arc::new(input(&mut out, prompt)?);
    if ignore_empty && input.is_empty() {
        return Ok(Ok(None));
    }
    match input.parse::<T>() {
        Ok(new) => Ok(Ok(Some(new))),
        Err(err) => {
            writeln!(out)?;
            underline(&mut out, &SubStr::all(input))?;
            writeln!(out, "parse error: {err}")?;
            Ok(Err(err))
        }
    }
}

/// Ask a yes/no question; blank keeps `current`.
pub fn read_toggle<W: Write>(
    mut out: W,
    prompt: impl fmt::Display,
    current: bool,
) -> anyhow::Result<bool> {
    loop {
        let answer = input(&mut out, &prompt)?;
        match answer.as_str() {
            "" => return Ok(current),
            "y" | "yes" | "on" => return Ok(true),
            "n" | "no" | "off" => return Ok(false),
            _ => writeln!(out, "note: expected 'y' or 'n' (blank keeps the current value)")?,
        }
    }
}

pub fn underline<W: Write>(mut out: W, span: &SubStr) -> io::Result<()> {
    writeln!(out, "{}", span.src())?;
    writeln!(
        out,
        "{}{}",
        " ".repeat(span.start()),
        "^".repeat(span.len().max(1))
    )?;
    Ok(())
}

pub fn expr_undefined<W: Write>(mut out: W) -> io::Result<()> {
    writeln!(out, "error: no function is defined")
}
