//! Library half of the `convoy` binary: config file handling and flag value parsers.

pub mod config;
pub mod duration;
