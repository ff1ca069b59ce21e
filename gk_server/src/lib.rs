//! Standalone host for the gatekeep core: configuration and logging setup
//! shared by the `gk_server` binary.

pub mod config;
pub mod logging;
