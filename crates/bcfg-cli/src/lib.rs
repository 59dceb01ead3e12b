//! Shared infrastructure for the `bcfg` binary.

pub mod logging;
