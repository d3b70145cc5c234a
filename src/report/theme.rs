//! Semantic color tokens for the status report, honoring `NO_COLOR`.

#![allow(missing_docs)]

use std::env;

/// Color output mode for compatibility with `NO_COLOR` and `--no-color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Enabled,
    Disabled,
}

impl ColorMode {
    /// Enabled only when both the caller and the environment allow it.
    #[must_use]
    pub fn resolve(requested: bool) -> Self {
        Self::from_flags(requested, env::var_os("NO_COLOR").is_some())
    }

    #[must_use]
    pub const fn from_flags(requested: bool, no_color_env: bool) -> Self {
        if requested && !no_color_env {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// Semantic token category independent of concrete color codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticToken {
    Neutral,
    Warning,
    Danger,
    Muted,
}

/// Paints text for a semantic token, or passes it through when disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    mode: ColorMode,
}

impl Palette {
    #[must_use]
    pub const fn new(mode: ColorMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self::new(ColorMode::Disabled)
    }

    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self.mode, ColorMode::Enabled)
    }

    #[must_use]
    pub fn paint(self, text: &str, token: SemanticToken) -> String {
        if !self.enabled() || token == SemanticToken::Neutral {
            return text.to_string();
        }
        styled(text, token)
    }
}

#[cfg(feature = "cli")]
fn styled(text: &str, token: SemanticToken) -> String {
    use colored::Colorize;

    match token {
        SemanticToken::Neutral => text.to_string(),
        SemanticToken::Warning => text.yellow().bold().to_string(),
        SemanticToken::Danger => text.red().bold().to_string(),
        SemanticToken::Muted => text.dimmed().to_string(),
    }
}

#[cfg(not(feature = "cli"))]
fn styled(text: &str, _token: SemanticToken) -> String {
    text.to_string()
}
