//! Operator-facing status report: resource usage, service states and sizes,
//! rendered as an aligned text table or JSON.

pub mod format;
pub mod status;
pub mod theme;
