//! Executor error types.

use thiserror::Error;

/// Errors from a venue call. Never escapes the lifecycle controller; each
/// one is classified into a terminal outcome or tolerated as transient.
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Venue returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Not supported: {0}")]
    Unsupported(String),
}

pub type VenueResult<T> = Result<T, VenueError>;

/// Construction-time errors (credentials, client setup).
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    #[error(transparent)]
    Venue(#[from] VenueError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
