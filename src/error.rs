//! Error types

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and connection errors
///
/// Every variant is fatal during startup: nothing in this crate retries or
/// degrades. [`Error::category`] maps a variant onto the coarse taxonomy used
/// in operator-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed connection descriptor
    #[error("invalid descriptor: {0}")]
    Config(String),

    /// CA material could not be loaded, or the trust profile was rejected
    #[error("TLS bootstrap failed: {0}")]
    Tls(String),

    /// I/O error on the transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Dial or handshake failure
    #[error("connection failed: {0}")]
    Connection(String),

    /// Authentication rejected or unsupported
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Server sent something this client does not understand
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error packet returned for a command
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        /// MySQL error number
        code: u16,
        /// SQLSTATE
        sql_state: String,
        /// Human-readable message
        message: String,
    },

    /// Server closed the connection
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation attempted in the wrong connection state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Schema reconciliation failed
    #[error("schema reconciliation failed: {0}")]
    Migration(String),
}

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Descriptor syntax
    ConfigParse,
    /// CA material or profile registration
    TlsBootstrap,
    /// Dial, TLS handshake, auth or protocol failure
    Connection,
    /// Schema reconciliation
    Migration,
}

impl Error {
    /// Taxonomy bucket for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::ConfigParse,
            Error::Tls(_) => ErrorCategory::TlsBootstrap,
            Error::Migration(_) => ErrorCategory::Migration,
            Error::Io(_)
            | Error::Connection(_)
            | Error::Authentication(_)
            | Error::Protocol(_)
            | Error::Server { .. }
            | Error::ConnectionClosed
            | Error::InvalidState { .. } => ErrorCategory::Connection,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigParse => write!(f, "config_parse"),
            Self::TlsBootstrap => write!(f, "tls_bootstrap"),
            Self::Connection => write!(f, "connection"),
            Self::Migration => write!(f, "migration"),
        }
    }
}
