//! Error types for Sweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-port and per-host
//! probe failures never show up here: they are folded into the results.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for probing operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid address range: {0}")]
    InvalidRange(String),

    #[error("invalid port interval: start ({start}) > end ({end})")]
    InvalidPortInterval { start: u16, end: u16 },

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("completion handshake broken: {0}")]
    Handshake(String),

    #[error("no draining signal within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for CLI handlers.
pub type CliResult<T> = Result<T, CliError>;
