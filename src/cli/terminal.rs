//! Terminal detection and output styling

use std::{fmt::Display, sync::LazyLock};

use owo_colors::{OwoColorize, colors::css};

/// Below this many columns, tables are printed as stacked lines.
const NARROW_COLUMNS: u16 = 60;

static COLOR: LazyLock<bool> =
    LazyLock::new(|| supports_color::on(supports_color::Stream::Stdout).is_some());

/// Whether stdout is a terminal narrower than [`NARROW_COLUMNS`].
pub fn is_narrow() -> bool {
    terminal_size::terminal_size().is_some_and(|(width, _)| width.0 < NARROW_COLUMNS)
}

/// Styles for terminal output, applied only when stdout supports colour.
pub trait Colorize: Display {
    /// Green, for healthy totals.
    fn success(&self) -> String {
        paint(self, |s| s.fg::<css::Green>().to_string())
    }

    /// Amber, for anything needing attention.
    fn warning(&self) -> String {
        paint(self, |s| s.fg::<css::Orange>().to_string())
    }

    /// Blue, for the headline result.
    fn info(&self) -> String {
        paint(self, |s| s.fg::<css::LightBlue>().to_string())
    }

    /// Dimmed, for headings and hints.
    fn dim(&self) -> String {
        paint(self, |s| s.dimmed().to_string())
    }
}

impl Colorize for str {}
impl Colorize for String {}

fn paint<T: Display + ?Sized>(value: &T, style: impl FnOnce(&str) -> String) -> String {
    let text = value.to_string();
    if *COLOR { style(&text) } else { text }
}
