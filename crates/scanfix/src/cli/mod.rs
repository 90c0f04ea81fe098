//! Command handlers for the `scanfix` binary.

pub mod config;
pub mod open;
pub mod process;
pub mod watch;

mod outcomes;
