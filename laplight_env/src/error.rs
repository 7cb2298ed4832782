//! Error types for the LapLight environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to the outside world.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Socket-level failure (connect refused, reset, DNS, ...)
    #[error("Network error: {0}")]
    NetworkError(String),
    
    /// Server answered with a non-success status line
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },
    
    /// Malformed response or payload that failed to deserialize
    #[error("Decode error: {0}")]
    DecodeError(String),
    
    /// URL is not a plain `http://host[:port]/path`
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    
    /// The network time authority gave no usable answer
    #[error("Time authority error: {0}")]
    TimeAuthority(String),
    
    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
    
    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }
}

impl From<std::io::Error> for EnvError {
    fn from(err: std::io::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}
