//! Error types.

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(String),
    #[error("toml deserialization error: {0}")]
    TomlDeserError(#[from] toml::de::Error),

    #[error("size mismatch for \"{name}\": expected {expected} values, got {found}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("expected a numeric value, got {0}")]
    NotNumeric(String),
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("failed parsing literal: {0}")]
    LiteralParse(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
