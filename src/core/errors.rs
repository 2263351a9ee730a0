//! POV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PovError>;

/// Top-level error type for prefs-overlay.
#[derive(Debug, Error)]
pub enum PovError {
    #[error("[POV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[POV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[POV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[POV-1101] no browser profile matching {pattern:?} under {root}")]
    ProfileNotFound { root: PathBuf, pattern: String },

    #[error("[POV-1102] required tool `{tool}` not found on PATH; {remediation}")]
    ToolMissing {
        tool: &'static str,
        remediation: String,
    },

    #[error("[POV-2001] base configuration unreadable at {path}: {details}")]
    BaseConfig { path: PathBuf, details: String },

    #[error("[POV-2002] backup failed: {details}")]
    Backup { details: String },

    #[error("[POV-2003] backup integrity mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("[POV-2004] backup not found: {id}")]
    BackupNotFound { id: String },

    #[error("[POV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[POV-2201] base configuration fetch failed: {details}")]
    Fetch { details: String },

    #[error("[POV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[POV-3003] atomic write of {path} failed: {source}")]
    AtomicWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[POV-3101] scheduler failure: {details}")]
    Schedule { details: String },

    #[error("[POV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl PovError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "POV-1001",
            Self::MissingConfig { .. } => "POV-1002",
            Self::ConfigParse { .. } => "POV-1003",
            Self::ProfileNotFound { .. } => "POV-1101",
            Self::ToolMissing { .. } => "POV-1102",
            Self::BaseConfig { .. } => "POV-2001",
            Self::Backup { .. } => "POV-2002",
            Self::IntegrityMismatch { .. } => "POV-2003",
            Self::BackupNotFound { .. } => "POV-2004",
            Self::Serialization { .. } => "POV-2101",
            Self::Fetch { .. } => "POV-2201",
            Self::Io { .. } => "POV-3002",
            Self::AtomicWrite { .. } => "POV-3003",
            Self::Schedule { .. } => "POV-3101",
            Self::Runtime { .. } => "POV-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Fetch { .. } | Self::Schedule { .. } | Self::Runtime { .. }
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
}

impl From<serde_json::Error> for PovError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PovError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
