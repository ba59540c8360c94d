//! FDR-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FedorableError>;

/// Top-level error type for fedorable.
#[derive(Debug, Error)]
pub enum FedorableError {
    #[error("[FDR-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FDR-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FDR-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FDR-1101] this program must be run as root (effective uid {euid})")]
    NotRoot { euid: u32 },

    #[error("[FDR-1102] confirmation required but stdin is not a terminal; re-run with --yes or --dry-run")]
    NonInteractive,

    #[error("[FDR-2001] another instance is already running (pid {pid}, lock {path})")]
    AlreadyRunning { pid: i32, path: PathBuf },

    #[error("[FDR-2002] lock file failure at {path}: {details}")]
    Lock { path: PathBuf, details: String },

    #[error("[FDR-2003] log setup failure at {path}: {details}")]
    LogSetup { path: PathBuf, details: String },

    #[error("[FDR-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FDR-3001] filesystem stats failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[FDR-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FDR-3003] failed to launch {program}: {details}")]
    Spawn { program: String, details: String },

    #[error("[FDR-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl FedorableError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FDR-1001",
            Self::MissingConfig { .. } => "FDR-1002",
            Self::ConfigParse { .. } => "FDR-1003",
            Self::NotRoot { .. } => "FDR-1101",
            Self::NonInteractive => "FDR-1102",
            Self::AlreadyRunning { .. } => "FDR-2001",
            Self::Lock { .. } => "FDR-2002",
            Self::LogSetup { .. } => "FDR-2003",
            Self::Serialization { .. } => "FDR-2101",
            Self::FsStats { .. } => "FDR-3001",
            Self::Io { .. } => "FDR-3002",
            Self::Spawn { .. } => "FDR-3003",
            Self::Runtime { .. } => "FDR-3900",
        }
    }

    /// Whether the failure happens before any task runs and must abort the process.
    #[must_use]
    pub const fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::NotRoot { .. }
                | Self::NonInteractive
                | Self::AlreadyRunning { .. }
                | Self::Lock { .. }
                | Self::LogSetup { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for lock file errors.
    #[must_use]
    pub fn lock(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Lock {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for FedorableError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FedorableError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_embedded_in_messages() {
        let err = FedorableError::AlreadyRunning {
            pid: 42,
            path: PathBuf::from("/run/fedorable.lock"),
        };
        assert_eq!(err.code(), "FDR-2001");
        assert!(err.to_string().starts_with("[FDR-2001]"));
        assert!(err.to_string().contains("pid 42"));
    }

    #[test]
    fn startup_classification() {
        assert!(FedorableError::NotRoot { euid: 1000 }.is_startup_fatal());
        assert!(FedorableError::NonInteractive.is_startup_fatal());
        assert!(
            !FedorableError::Runtime {
                details: "x".into()
            }
            .is_startup_fatal()
        );
    }

    #[test]
    fn toml_errors_convert_to_config_parse() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("= broken");
        let err: FedorableError = parse.unwrap_err().into();
        assert_eq!(err.code(), "FDR-1003");
    }
}
