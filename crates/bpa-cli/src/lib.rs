//! Host components of the `bpa` command-line tool.

pub mod logging;
pub mod sources;
