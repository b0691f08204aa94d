//! Error types and handling for the softphone core
//!
//! This module defines all error types that can occur during client operations
//! and provides guidance on how to handle them.
//!
//! # Error Categories
//!
//! Errors are categorized to help with recovery strategies:
//!
//! - **Configuration Errors** - Bad or missing identity/relay settings; fatal
//!   at startup and surfaced to the operator, never retried by this layer
//! - **Address Errors** - Malformed local or target URI; reported
//!   synchronously before any network action, no state is created
//! - **Startup/Transport Errors** - The signaling agent failed to start or a
//!   request failed; the session and registration stay in their prior safe
//!   state, retry policy belongs to a higher layer
//! - **State Errors** - A command was issued in a state that disallows it
//!   (e.g. answering with no incoming session); rejected with a status
//!   message, never fatal
//!
//! # Propagation Policy
//!
//! Startup and configuration failures are returned as `Err` to the caller.
//! Once a call is in flight, every per-operation failure (accept, reject,
//! bye, DTMF, media bind) is caught at the controller boundary and converted
//! into a status-projection update; nothing from this core terminates the
//! host process.
//!
//! ```rust
//! use softphone_core::ClientError;
//!
//! let err = ClientError::invalid_address("not-a-uri", "missing sip: scheme");
//! assert_eq!(err.category(), "address");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Result type alias for softphone-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types for softphone call-session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Configuration errors
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// Malformed local or target URI, detected before any network action
    #[error("Invalid address '{uri}': {reason}")]
    InvalidAddress { uri: String, reason: String },

    /// The signaling agent failed to start
    #[error("Signaling agent startup failed: {reason}")]
    StartupFailed { reason: String },

    /// A signaling request failed after startup
    #[error("Transport request failed: {reason}")]
    TransportFailed { reason: String },

    /// Command issued in a state that disallows it
    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },

    /// Generic errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ClientError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { field: field.into(), reason: reason.into() }
    }

    /// Create a missing configuration error
    pub fn missing_configuration(field: impl Into<String>) -> Self {
        Self::MissingConfiguration { field: field.into() }
    }

    /// Create an invalid address error
    pub fn invalid_address(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress { uri: uri.into(), reason: reason.into() }
    }

    /// Create a startup failed error
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed { reason: reason.into() }
    }

    /// Create a transport failed error
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        Self::TransportFailed { reason: reason.into() }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperation { operation: operation.into(), reason: reason.into() }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is recoverable by retrying later
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Transient network-side failures
            ClientError::StartupFailed { .. } | ClientError::TransportFailed { .. } => true,

            // Require operator or caller intervention
            ClientError::InvalidConfiguration { .. }
            | ClientError::MissingConfiguration { .. }
            | ClientError::InvalidAddress { .. }
            | ClientError::InvalidOperation { .. }
            | ClientError::InternalError { .. } => false,
        }
    }

    /// Check if this error is fatal at startup (operator must fix config)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfiguration { .. } | ClientError::MissingConfiguration { .. }
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::InvalidConfiguration { .. } | ClientError::MissingConfiguration { .. } => {
                "configuration"
            }
            ClientError::InvalidAddress { .. } => "address",
            ClientError::StartupFailed { .. } | ClientError::TransportFailed { .. } => "transport",
            ClientError::InvalidOperation { .. } => "state",
            ClientError::InternalError { .. } => "system",
        }
    }
}
