//! fedorable: a root-only Fedora maintenance runner.
//!
//! Invokes existing system tools (`dnf`, `rpm`, `journalctl`, `flatpak`, ...) in a
//! fixed tiered order behind confirmation prompts, dry-run, and a host-wide lock.

pub mod core;
pub mod logger;
pub mod platform;
pub mod report;
pub mod runner;
pub mod tasks;

pub use crate::core::errors::{FedorableError, Result};
