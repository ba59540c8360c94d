//! Host access: command execution, program lookup, filesystem stats, and the
//! parsers for tool output.

pub mod pal;
pub mod queries;
pub mod scripted;
