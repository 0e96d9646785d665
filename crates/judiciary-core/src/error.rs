//! Error types for the judiciary agents

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting for {addr}")]
    Timeout { addr: String },

    #[error("datagram of {0} bytes exceeds the 64 KiB limit")]
    PayloadTooLarge(usize),

    #[error("invalid lawsuit id: {0}")]
    InvalidId(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no trials registered in this district")]
    NoLocalTrials,

    #[error("trial identity not established; handshake with the district first")]
    IdentityIncomplete,

    #[error("peer {addr} refused: {message}")]
    Refused { addr: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn refused(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Refused {
            addr: addr.into(),
            message: message.into(),
        }
    }
}
