//! Transport layer for CLI and HTTP

pub mod cli;
pub mod http;
