use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    #[error("Value cannot be empty")]
    EmptyValue,

    #[error("Key {0:?} already exists")]
    DuplicateKey(String),

    #[error("Key {0:?} not found")]
    KeyNotFound(String),

    #[error("Key {0:?} expired and has been removed")]
    Expired(String),

    #[error("Writing to {path:?} would exceed its size limit ({len} of {max_size} bytes used)")]
    SizeLimit {
        path: PathBuf,
        len: u64,
        max_size: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Stored payloads are only ever produced by the store's own encoder, so this means the log
    // was damaged on disk.
    #[error("Corrupt stored value: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], for callers that only care about what went wrong and
/// not the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateKey,
    NotFound,
    Expired,
    SizeLimit,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey(_) | Self::EmptyValue => ErrorKind::Validation,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::Expired(_) => ErrorKind::Expired,
            Self::SizeLimit { .. } => ErrorKind::SizeLimit,
            Self::Io(_) | Self::Decode(_) => ErrorKind::Io,
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Decode(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
