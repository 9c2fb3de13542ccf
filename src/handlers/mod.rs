//! HTTP handlers for command execution.

pub mod command;
pub use command::*;
