//! Error types for the collection protocol

use std::fmt;

/// Result type alias for collection-protocol operations
pub type CollectResult<T> = Result<T, CollectError>;

/// Errors surfaced by the session layer during a collection cycle.
///
/// Connection errors are fatal to the cycle; send errors are recovered
/// locally by skipping the affected query target.
#[derive(Debug)]
pub enum CollectError {
    /// No broker endpoint could be reached, the broker rejected the
    /// credentials, or the session died mid-cycle
    Connection(String),

    /// A statistics request could not be transmitted
    Send(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Connection(msg) => {
                write!(f, "failed to establish broker session: {}", msg)
            }
            CollectError::Send(msg) => write!(f, "failed to send statistics request: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(err: std::io::Error) -> Self {
        CollectError::Connection(err.to_string())
    }
}
