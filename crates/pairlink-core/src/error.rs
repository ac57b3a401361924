//! Error types for PairLink
//!
//! Specific error enums for each boundary plus the main [`PairlinkError`]
//! type that unifies them. Transport-level failures are never fatal: the
//! runtime absorbs them into retry scheduling and a connectivity flag.
//! Store failures at startup are fatal, since the system has no meaningful
//! degraded mode without durable state.

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures at the transport boundary
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open listening endpoint: {reason}")]
    EndpointFailed { reason: String },
    #[error("connection to {address} failed: {reason}")]
    ConnectFailed { address: String, reason: String },
    #[error("data channel closed: {reason}")]
    ChannelClosed { reason: String },
    #[error("transport task is not attached to runtime channels")]
    NotAttached,
}

// ----------------------------------------------------------------------------
// Store Errors
// ----------------------------------------------------------------------------

/// Failures at the persistence boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend failure on slot {slot}: {reason}")]
    Backend { slot: String, reason: String },
    #[error("corrupt data in slot {slot}: {source}")]
    Corrupt {
        slot: String,
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn backend(slot: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Backend {
            slot: slot.into(),
            reason: reason.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Geolocation Errors
// ----------------------------------------------------------------------------

/// Failures of a single one-shot position request
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoError {
    #[error("location permission denied")]
    Denied,
    #[error("location unavailable: {reason}")]
    Unavailable { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Main error type for PairLink
#[derive(Debug, thiserror::Error)]
pub enum PairlinkError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("geolocation error: {0}")]
    Geo(#[from] GeoError),

    /// Login email did not match the roster; no state was mutated
    #[error("login rejected: email not in the roster")]
    LoginRejected,

    #[error("call signaling failed: {reason}")]
    CallSignaling { reason: String },

    /// Inter-task channel failure (internal to the runtime)
    #[error("channel error: {message}")]
    Channel { message: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl PairlinkError {
    /// Create a channel error with a message
    pub fn channel_error(message: impl Into<String>) -> Self {
        PairlinkError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error(reason: impl Into<String>) -> Self {
        PairlinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a call signaling error with a reason
    pub fn call_signaling(reason: impl Into<String>) -> Self {
        PairlinkError::CallSignaling {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, PairlinkError>;
