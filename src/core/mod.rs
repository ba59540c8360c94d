//! Core types: errors, task identifiers, configuration and option precedence.

pub mod config;
pub mod errors;
pub mod options;
pub mod task_id;
