//! Error types for taxon-curate.
//!
//! Fatal errors only. Recoverable problems found while curating (missing
//! references, directive conflicts, ...) are collected as
//! [`Diagnostics`](crate::diagnostics::Diagnostics) instead.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CurateError>;

#[derive(Error, Debug)]
pub enum CurateError {
    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A tab-separated table could not be read or written.
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The TOML configuration file is malformed.
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The identifier pattern in the configuration is not a valid regex.
    #[error("Invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A row or value in one of the input tables is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CurateError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CurateError::InvalidInput(msg.into())
    }
}
