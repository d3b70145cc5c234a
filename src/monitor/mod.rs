//! Host monitoring: usage snapshots, service states, application project info.

pub mod probe;
pub mod project;
