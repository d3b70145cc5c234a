//! Pure formatting helpers for the status table.
//!
//! Every value arrives as a `Result`; unavailable values render as `ERR`
//! instead of aborting the report.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;

use crate::core::config::SizeUnit;
use crate::monitor::probe::ServiceState;
use crate::report::theme::{Palette, SemanticToken};

/// Smallest and largest width honored as given; anything else follows the terminal.
pub const MIN_WIDTH: usize = 40;
pub const MAX_WIDTH: usize = 100;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[mGKH]").expect("ansi pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// Width requested on the command line or in config, or the terminal width
/// when the request falls outside [`MIN_WIDTH`]..=[`MAX_WIDTH`].
#[must_use]
pub fn effective_width(requested: usize, terminal: Option<usize>) -> usize {
    if (MIN_WIDTH..=MAX_WIDTH).contains(&requested) {
        requested
    } else {
        terminal.unwrap_or(requested).max(MIN_WIDTH)
    }
}

/// `(left, right)` column widths: the label column takes `1/parts` of `size`.
#[must_use]
pub const fn split_size(size: usize, parts: usize) -> (usize, usize) {
    let left = size / parts;
    (left, size - left)
}

/// Printable width of `text`, ignoring ANSI escape sequences.
#[must_use]
pub fn visible_len(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").chars().count()
}

/// Pad `text` to `width` visible columns with `fill`.
#[must_use]
pub fn align(text: &str, side: Align, width: usize, fill: char) -> String {
    let pad = width.saturating_sub(visible_len(text));
    let fill_str = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    match side {
        Align::Left => format!("{text}{}", fill_str(pad)),
        Align::Right => format!("{}{text}", fill_str(pad)),
        Align::Center => {
            let left = pad / 2;
            format!("{}{text}{}", fill_str(left), fill_str(pad - left))
        }
    }
}

#[must_use]
pub fn err_out(palette: Palette) -> String {
    palette.paint("ERR", SemanticToken::Danger)
}

/// Section title centered in a dashed rule.
#[must_use]
pub fn title(text: &str, width: usize, palette: Palette) -> String {
    let label = palette.paint(&format!(" {text} "), SemanticToken::Muted);
    align(&label, Align::Center, width, '-')
}

/// Usage percentage with one decimal, colored by threshold.
#[must_use]
pub fn format_usage<E>(
    percent: Result<f64, E>,
    warning_pct: f64,
    critical_pct: f64,
    palette: Palette,
) -> String {
    match percent {
        Ok(pct) if (0.0..=100.0).contains(&pct) => {
            let token = if pct <= warning_pct {
                SemanticToken::Neutral
            } else if pct <= critical_pct {
                SemanticToken::Warning
            } else {
                SemanticToken::Danger
            };
            palette.paint(&format!("{pct:.1}%"), token)
        }
        _ => err_out(palette),
    }
}

const fn state_token(state: ServiceState) -> SemanticToken {
    match state {
        ServiceState::Active => SemanticToken::Neutral,
        ServiceState::Activating | ServiceState::Deactivating => SemanticToken::Warning,
        ServiceState::Inactive
        | ServiceState::Failed
        | ServiceState::NotFound
        | ServiceState::Dead => SemanticToken::Danger,
    }
}

#[must_use]
pub fn format_service_state<E>(state: Result<ServiceState, E>, palette: Palette) -> String {
    match state {
        Ok(state) => palette.paint(state.as_str(), state_token(state)),
        Err(_) => err_out(palette),
    }
}

/// Bytes in the given unit with two decimals. Whole bytes print without decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn size_in_unit(bytes: u64, unit: SizeUnit) -> String {
    if unit == SizeUnit::B {
        return format!("{bytes}B");
    }
    let scaled = bytes as f64 / (1u64 << unit.shift()) as f64;
    format!("{scaled:.2}{}", unit.suffix())
}

/// Largest unit that keeps the value below 1024.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = SizeUnit::B;
    for next in SizeUnit::ALL.into_iter().skip(1) {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    if unit == SizeUnit::B {
        format!("{bytes}B")
    } else {
        format!("{value:.2}{}", unit.suffix())
    }
}

/// Size settings shared by every size cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFormat {
    pub unit: SizeUnit,
    pub human: bool,
}

impl SizeFormat {
    #[must_use]
    pub fn bytes(self, bytes: u64) -> String {
        if self.human {
            human_size(bytes)
        } else {
            size_in_unit(bytes, self.unit)
        }
    }
}

#[must_use]
pub fn format_size<E>(bytes: Result<u64, E>, size: SizeFormat, palette: Palette) -> String {
    bytes.map_or_else(|_| err_out(palette), |b| size.bytes(b))
}

/// `used/total` pair.
#[must_use]
pub fn format_size_pair<E>(
    pair: Result<(u64, u64), E>,
    size: SizeFormat,
    palette: Palette,
) -> String {
    pair.map_or_else(
        |_| err_out(palette),
        |(used, total)| format!("{}/{}", size.bytes(used), size.bytes(total)),
    )
}
