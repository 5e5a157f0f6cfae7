//! Error types for the zwave-connector library.

use thiserror::Error;

use crate::network::LifecycleState;
use crate::types::NodeId;

/// The main error type for connector operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error in '{path}': {reason}")]
    Config { path: String, reason: String },

    /// Driver options could not be locked for the device.
    #[error("controller initialization failed for device '{device}': {reason}")]
    DeviceInit { device: String, reason: String },

    /// Error reported by the controller driver.
    #[error("driver error: {message}")]
    Driver { message: String },

    /// Network never reported the awaked state.
    #[error("network is not awake after {ticks} polls")]
    AwakeTimeout { ticks: u32 },

    /// Network awaked but never reported ready.
    #[error("network is not ready after {ticks} polls")]
    ReadyTimeout { ticks: u32 },

    /// A readiness wait was interrupted.
    #[error("waiting for network {phase} was cancelled")]
    Cancelled { phase: &'static str },

    /// Operation not allowed in the current lifecycle state.
    #[error("cannot {operation} while network is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Requested node range does not fit the network.
    #[error("bad node range [{start}, {end}) for a network of {node_count} nodes")]
    InvalidRange {
        start: i64,
        end: i64,
        node_count: usize,
    },

    /// Node id outside the addressable range.
    #[error("invalid node id {0}")]
    InvalidNode(NodeId),

    /// Node identity fields could not be decoded.
    #[error("node {node_id}: {source}")]
    Identity {
        node_id: NodeId,
        #[source]
        source: IdentityError,
    },

    /// HTTP error while publishing.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected a published envelope.
    #[error("publish rejected with status {status}")]
    Publish { status: u16 },

    /// Command recognized but not supported.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Usage errors caught by the argument parser exit with 2 before any of
    /// these are produced.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidRange { .. } => 3,
            Self::NotImplemented(_) => 4,
            Self::Config { .. } => 5,
            Self::DeviceInit { .. } | Self::Driver { .. } => 6,
            Self::AwakeTimeout { .. } | Self::ReadyTimeout { .. } => 7,
            Self::Cancelled { .. } => 8,
            _ => 1,
        }
    }
}

/// Node identity decoding errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Raw field lacks the two-character `0x` prefix.
    #[error("{field} '{raw}' is missing the 0x prefix")]
    MissingPrefix { field: &'static str, raw: String },

    /// Digits after the prefix are not whole hex bytes.
    #[error("{field} '{raw}' is not valid hex: {source}")]
    InvalidHex {
        field: &'static str,
        raw: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;
