//! Error types for compile-service.

use thiserror::Error;

/// Main error type for all compile-service operations.
#[derive(Debug, Error)]
pub enum CompileServiceError {
    /// I/O error during socket or process operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (single-shot output only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (oversized line, unknown response tag, bad length).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The compile invoker failed. Surfaced to clients as an `EXCEPTION` response.
    #[error("{0}")]
    Compiler(String),

    /// The listener could not bind its port.
    #[error("Could not listen on port {port}: {reason}")]
    Bind { port: u16, reason: String },

    /// Invalid configuration (bad separator, bad port).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No bytes arrived within the configured idle timeout.
    #[error("Idle timeout")]
    IdleTimeout,
}

/// Result type alias using CompileServiceError.
pub type Result<T> = std::result::Result<T, CompileServiceError>;
