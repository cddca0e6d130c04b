//! Core error types for homelink

use hl_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type surfaced by the remote coordinator
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The operation needs a loaded backend
    #[error("Remote backend is not loaded")]
    NotConnected,

    /// Backend API error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// Tunnel transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The backend was torn down or reloaded while the operation was running
    #[error("Backend was reloaded during the operation")]
    Superseded,

    /// The task running the operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,
}

/// Remote backend API errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// No response within the deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Payload failed validation
    #[error("Invalid payload: {0}")]
    Protocol(#[from] ProtocolError),

    /// Client is misconfigured
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Certificate authority errors
#[derive(Error, Debug)]
pub enum CertificateError {
    /// Issuance or renewal failed
    #[error("Certificate issuance failed: {0}")]
    Issue(String),

    /// Existing certificate could not be loaded
    #[error("Certificate load failed: {0}")]
    Load(String),

    /// TLS context could not be built from the key material
    #[error("TLS context error: {0}")]
    Tls(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tunnel transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Relay connection failed
    #[error("Connection to relay failed: {0}")]
    Connect(String),

    /// Tunnel client could not be started
    #[error("Tunnel client failed to start: {0}")]
    Start(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
