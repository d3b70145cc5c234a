//! Host integration: subprocess runner, procfs parsers, startup preflight and
//! the [`pal::SystemHost`] facade.

pub mod command;
pub mod linux;
pub mod pal;
pub mod preflight;
